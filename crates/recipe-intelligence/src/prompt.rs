//! Prompt construction for the upstream generative model.
//!
//! The JSON shape blocks below ARE the response contract: decoding in
//! `client` expects exactly these keys. Change them together.

const RECIPE_SHAPE: &str = r#"{
  "name": "Recipe Name",
  "description": "Brief description",
  "prepTime": "Preparation time",
  "cookTime": "Cooking time",
  "servings": "Number of servings",
  "ingredients": ["List of ingredients"],
  "instructions": ["Step by step instructions"],
  "nutritionInfo": {
    "calories": "per serving",
    "protein": "in grams",
    "carbs": "in grams",
    "fat": "in grams"
  }
}"#;

const IMAGE_SHAPE: &str = r#"{
  "type": "ingredients|dish",
  "identified": ["list of identified items"],
  "suggestedRecipes": ["list of recipe names"]
}"#;

pub(crate) fn recipe_prompt(query: &str) -> String {
    format!(
        "Generate a detailed recipe for \"{query}\". \
         Respond with exactly one JSON object and no surrounding prose, \
         in the following format:\n{RECIPE_SHAPE}"
    )
}

pub(crate) fn image_prompt() -> String {
    format!(
        "Analyze this image and identify the ingredients or dish shown. \
         If it shows ingredients, list them and suggest possible recipes. \
         If it shows a prepared dish, identify it and suggest similar recipes. \
         Respond with exactly one JSON object and no surrounding prose, \
         in the following format:\n{IMAGE_SHAPE}"
    )
}
