use std::path::Path;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use forkful_common::gemini::{GeminiClient, GeminiConfig};
use recipe_intelligence::client::RecipeIntelligenceClient;

const USAGE: &str = "usage:
  forkful recipe <query...>
  forkful analyze <image-path> [mime-type]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout is reserved for the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!("{USAGE}");
    };

    let config = GeminiConfig::from_env()?;
    info!(base_url = %config.base_url, model = %config.model, "gemini client configured");
    let client = RecipeIntelligenceClient::new(GeminiClient::new(config)?);

    match command.as_str() {
        "recipe" => {
            let query = rest.join(" ");
            if query.trim().is_empty() {
                bail!("{USAGE}");
            }
            let recipe = client.resolve_recipe(&query, None).await?;
            println!("{}", serde_json::to_string_pretty(&recipe)?);
        }
        "analyze" => {
            let Some(path) = rest.first() else {
                bail!("{USAGE}");
            };
            let mime_type = match rest.get(1) {
                Some(mime) => mime.clone(),
                None => guess_mime_type(Path::new(path)).to_string(),
            };
            let image = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read image {path}"))?;
            info!(path, mime_type, bytes = image.len(), "analyzing image");
            let analysis = client.analyze_image(&image, &mime_type, None).await?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        other => bail!("unknown command {other:?}\n{USAGE}"),
    }

    Ok(())
}

// The camera pipeline this stands in for emits JPEG, hence the fallback.
fn guess_mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        Some(ext) if ext.eq_ignore_ascii_case("webp") => "image/webp",
        Some(ext) if ext.eq_ignore_ascii_case("gif") => "image/gif",
        Some(ext) if ext.eq_ignore_ascii_case("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_guess_covers_common_extensions() {
        assert_eq!(guess_mime_type(Path::new("shot.PNG")), "image/png");
        assert_eq!(guess_mime_type(Path::new("shot.webp")), "image/webp");
        assert_eq!(guess_mime_type(Path::new("shot.jpg")), "image/jpeg");
        assert_eq!(guess_mime_type(Path::new("shot")), "image/jpeg");
    }
}
