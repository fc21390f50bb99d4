use rust_embed::RustEmbed;

/// The static landing page served at `GET /`. Declared via `rust-embed` the
/// way the teacher's admin crate embeds its static assets, so the binary
/// carries the page without a runtime filesystem dependency.
#[derive(RustEmbed)]
#[folder = "assets/"]
struct Assets;

pub fn landing_page() -> &'static [u8] {
    static PAGE: std::sync::OnceLock<Vec<u8>> = std::sync::OnceLock::new();
    PAGE.get_or_init(|| {
        Assets::get("index.html")
            .map(|f| f.data.into_owned())
            .unwrap_or_default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_page_is_embedded() {
        let page = landing_page();
        assert!(!page.is_empty());
        assert!(String::from_utf8_lossy(page).contains("dat-gateway"));
    }
}
