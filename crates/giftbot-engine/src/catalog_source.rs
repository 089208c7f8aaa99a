use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use giftbot_contracts::catalog::{Catalog, Product};
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;

use crate::config::{BackendMode, BrokerConfig};

/// Resolve the catalog snapshot for this process.
///
/// An explicit file wins; otherwise the backend mode decides between the
/// built-in seed catalog and the shop's REST endpoint.
pub fn load_catalog(config: &BrokerConfig) -> Result<Catalog> {
    if let Some(path) = config.catalog_path.as_deref() {
        return load_catalog_file(path);
    }
    match config.backend {
        BackendMode::Mock => Ok(Catalog::seeded()),
        BackendMode::Networked => fetch_catalog(&config.shop_api_url, config.request_timeout),
    }
}

pub fn load_catalog_file(path: &Path) -> Result<Catalog> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    parse_catalog_json(&raw).with_context(|| format!("invalid catalog {}", path.display()))
}

pub fn fetch_catalog(api_url: &str, timeout: Duration) -> Result<Catalog> {
    let endpoint = format!("{}/products", api_url.trim_end_matches('/'));
    let response = HttpClient::new()
        .get(&endpoint)
        .timeout(timeout)
        .send()
        .with_context(|| format!("catalog request to {endpoint} failed"))?;
    let status = response.status();
    let body = response
        .text()
        .context("catalog response body read failed")?;
    if !status.is_success() {
        bail!(
            "catalog request to {endpoint} failed ({}): {}",
            status.as_u16(),
            crate::http::truncate_text(&body, 256)
        );
    }
    parse_catalog_json(&body).with_context(|| format!("invalid catalog from {endpoint}"))
}

/// Accepts a bare product array or an object wrapping it under `products`
/// (optionally nested in `data`).
pub fn parse_catalog_json(raw: &str) -> Result<Catalog> {
    let value: Value = serde_json::from_str(raw).context("catalog is not valid JSON")?;
    let list = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => {
            let nested = map
                .remove("products")
                .or_else(|| map.remove("data").and_then(|data| data.get("products").cloned()));
            match nested {
                Some(list @ Value::Array(_)) => list,
                _ => bail!("catalog object has no 'products' array"),
            }
        }
        _ => bail!("catalog must be a JSON array of products"),
    };
    let products: Vec<Product> =
        serde_json::from_value(list).context("catalog products do not match the product shape")?;
    let count = products.len();
    let catalog = Catalog::new(products)?;
    tracing::debug!(products = count, fingerprint = %catalog.fingerprint(), "catalog loaded");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::path::PathBuf;
    use std::thread;

    use serde_json::json;

    use super::*;

    fn product_json(id: u32, name: &str) -> Value {
        json!({
            "id": id,
            "name": name,
            "category": "Arts & Crafts",
            "price": 899,
            "rating": 4.5,
            "reviews": 12,
            "stock": 3
        })
    }

    #[test]
    fn mock_backend_uses_seed_catalog() -> Result<()> {
        let catalog = load_catalog(&BrokerConfig::default())?;
        assert_eq!(catalog.fingerprint(), Catalog::seeded().fingerprint());
        Ok(())
    }

    #[test]
    fn file_overrides_backend() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("catalog.json");
        fs::write(
            &path,
            serde_json::to_string(&json!({ "products": [product_json(1, "Paint Party Set")] }))?,
        )?;
        let config = BrokerConfig {
            catalog_path: Some(path),
            backend: BackendMode::Networked,
            ..BrokerConfig::default()
        };
        let catalog = load_catalog(&config)?;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.products()[0].name, "Paint Party Set");
        Ok(())
    }

    #[test]
    fn wrapped_data_shape_is_accepted() -> Result<()> {
        let raw = json!({ "data": { "products": [product_json(7, "Kite")] } }).to_string();
        assert_eq!(parse_catalog_json(&raw)?.len(), 1);
        Ok(())
    }

    #[test]
    fn invalid_catalogs_are_rejected() {
        assert!(parse_catalog_json("{\"items\": []}").is_err());
        assert!(parse_catalog_json("42").is_err());
        let duplicate = json!([product_json(1, "A"), product_json(1, "B")]).to_string();
        assert!(parse_catalog_json(&duplicate).is_err());
        let missing = BrokerConfig {
            catalog_path: Some(PathBuf::from("/nonexistent/catalog.json")),
            ..BrokerConfig::default()
        };
        let err = load_catalog(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read catalog"));
    }

    #[test]
    fn networked_backend_fetches_products() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let api_url = format!("http://{}/api", listener.local_addr()?);
        let server = thread::spawn(move || -> Result<String> {
            let (mut stream, _) = listener.accept()?;
            let mut buf = [0u8; 2048];
            let read = stream.read(&mut buf)?;
            let body = json!([product_json(3, "Garden Explorer Set")]).to_string();
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )?;
            Ok(String::from_utf8_lossy(&buf[..read]).to_string())
        });
        let catalog = fetch_catalog(&api_url, Duration::from_secs(5))?;
        let request = server.join().map_err(|_| anyhow::anyhow!("stub panicked"))??;
        assert!(request.starts_with("GET /api/products "));
        assert_eq!(catalog.products()[0].name, "Garden Explorer Set");
        Ok(())
    }
}
