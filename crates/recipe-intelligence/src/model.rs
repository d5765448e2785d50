use serde::{Deserialize, Serialize};

/// A fully populated recipe returned by [`resolve_recipe`].
///
/// Every field is required: a response missing any of them is rejected during
/// decoding, so callers never see a partially populated recipe. Duration and
/// count fields are free-text as produced upstream (e.g. "20 minutes") and
/// are not parsed into numeric types.
///
/// [`resolve_recipe`]: crate::client::RecipeIntelligenceClient::resolve_recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub name: String,
    pub description: String,
    pub prep_time: String,
    pub cook_time: String,
    pub servings: String,
    /// Ordered ingredient list.
    pub ingredients: Vec<String>,
    /// Ordered steps; index + 1 is the step number.
    pub instructions: Vec<String>,
    pub nutrition_info: NutritionInfo,
}

/// Per-serving nutrition summary. Units are embedded in the text
/// (e.g. "12g"), not normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionInfo {
    pub calories: String,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
}

/// Structured interpretation of a photograph, returned by [`analyze_image`].
///
/// [`analyze_image`]: crate::client::RecipeIntelligenceClient::analyze_image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysisResult {
    /// Whether the photo shows loose ingredients or a prepared dish.
    #[serde(rename = "type")]
    pub kind: AnalysisKind,
    /// Named ingredients, or the identified dish.
    pub identified: Vec<String>,
    /// Recipe names suitable as inputs to recipe resolution.
    pub suggested_recipes: Vec<String>,
}

/// Interpretation mode discriminator. Any other wire value is a contract
/// violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Ingredients,
    Dish,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipe_round_trips_through_camel_case_wire_keys() {
        let json = r#"{
            "name": "Banana Pancakes",
            "description": "Fluffy pancakes",
            "prepTime": "10 minutes",
            "cookTime": "15 minutes",
            "servings": "4",
            "ingredients": ["2 bananas", "2 eggs"],
            "instructions": ["Mash bananas", "Fry"],
            "nutritionInfo": {"calories": "210", "protein": "6g", "carbs": "32g", "fat": "7g"}
        }"#;
        let recipe: Recipe = serde_json::from_str(json).expect("decode");
        assert_eq!(recipe.prep_time, "10 minutes");
        assert_eq!(recipe.nutrition_info.fat, "7g");

        let value = serde_json::to_value(&recipe).expect("encode");
        assert_eq!(value["cookTime"], "15 minutes");
        assert_eq!(value["nutritionInfo"]["carbs"], "32g");
    }

    #[test]
    fn analysis_kind_rejects_unknown_discriminators() {
        assert!(serde_json::from_str::<AnalysisKind>("\"ingredients\"").is_ok());
        assert!(serde_json::from_str::<AnalysisKind>("\"dish\"").is_ok());
        assert!(serde_json::from_str::<AnalysisKind>("\"selfie\"").is_err());
        assert!(serde_json::from_str::<AnalysisKind>("\"Ingredients\"").is_err());
    }

    #[test]
    fn analysis_result_maps_the_type_wire_key() {
        let json = r#"{"type":"dish","identified":["ramen"],"suggestedRecipes":["Shoyu Ramen"]}"#;
        let result: ImageAnalysisResult = serde_json::from_str(json).expect("decode");
        assert_eq!(result.kind, AnalysisKind::Dish);
        assert_eq!(result.suggested_recipes, vec!["Shoyu Ramen"]);
    }
}
