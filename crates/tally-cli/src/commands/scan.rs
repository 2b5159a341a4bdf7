//! Scan command

use std::path::Path;

use anyhow::{bail, Context, Result};

use tally_core::ai::{ModelGateway, ParseSource};

/// Guess a MIME type from the file extension
fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        // Receipts are overwhelmingly jpeg photos
        _ => "image/jpeg",
    }
}

pub async fn cmd_scan(
    image: &Path,
    lang: Option<&str>,
    json: bool,
    no_fallback: bool,
) -> Result<()> {
    let bytes = std::fs::read(image)
        .with_context(|| format!("Failed to read image {}", image.display()))?;
    if bytes.is_empty() {
        bail!("Image file is empty");
    }

    let gateway = ModelGateway::from_env();
    let label = format!("cli-scan:{}", image.display());

    let result = if no_fallback {
        gateway
            .parse_receipt_strict(&bytes, mime_for(image), lang, &label)
            .await?
    } else {
        gateway
            .parse_receipt(&bytes, mime_for(image), lang, &label)
            .await
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.source == ParseSource::Mock {
        println!("(no provider reachable - showing the built-in mock result)\n");
    }

    println!(
        "{:<30} {:>8} {:>10} {:>10}",
        "ITEM", "QTY", "UNIT", "TOTAL"
    );
    for item in &result.items {
        let name = match item.kind {
            Some(kind) if kind != tally_core::ItemKind::Item => {
                format!("{} [{}]", item.name, kind.as_str())
            }
            _ => item.name.clone(),
        };
        println!(
            "{:<30} {:>8} {:>10.2} {:>10.2}",
            name, item.quantity, item.unit_price, item.total_price
        );
    }
    println!(
        "\nGrand total: {:.2} {}",
        result.summary.grand_total, result.summary.currency
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("a.webp")), "image/webp");
        assert_eq!(mime_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("noext")), "image/jpeg");
    }
}
