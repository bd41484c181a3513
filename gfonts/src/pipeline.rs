//! From a family/weight selection to merged fonts ready for display

use std::collections::BTreeSet;

use indexmap::IndexMap;
use url::Url;

use crate::css::parse_stylesheet;
use crate::{
    Error, FontFaceRule, FontKey, FontsClient, Result, extract_local_names, font_face_rules,
    font_keys, merge_subsets, select_simplest_name,
};

/// One merged font and the values a front end shows for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontInstance {
    pub key: FontKey,
    /// Family name as declared in the stylesheet
    pub family: String,
    /// The simplest `local()` name of the face, or the family name
    pub name: String,
    /// Weight on the 0..100 scale, when the CSS weight is one of the nine classes
    pub normalized_weight: Option<u8>,
    pub italic: bool,
    /// A complete TrueType font
    pub data: Vec<u8>,
}

/// Fetch, analyze, download and merge one selection.
///
/// Returns one instance per font key, in the order the stylesheet declares them.
pub async fn load_selection(
    client: &FontsClient,
    family: &str,
    weight: Option<&str>,
) -> Result<Vec<FontInstance>> {
    let stylesheet_url = client.css_url(family, weight)?;
    let css = client.fetch_css(family, weight).await?;
    let (mut sources, local_names) = {
        let stylesheet = parse_stylesheet(&css)?;
        let rules = font_face_rules(&stylesheet);
        let keys = font_keys(&rules);

        let mut sources = IndexMap::with_capacity(keys.len());
        let mut local_names: IndexMap<FontKey, BTreeSet<String>> =
            IndexMap::with_capacity(keys.len());
        for (key, uris) in keys {
            let same_key: Vec<FontFaceRule> =
                rules.iter().filter(|r| r.key() == key).cloned().collect();
            local_names.insert(key.clone(), extract_local_names(&same_key));

            let resolved = uris
                .iter()
                .map(|uri| resolve(&stylesheet_url, uri))
                .collect::<Result<Vec<_>>>()?;
            sources.insert(key, resolved);
        }
        (sources, local_names)
    };

    sources.retain(|key, uris| {
        if uris.is_empty() {
            tracing::warn!(%key, "No downloadable sources, skipping");
        }
        !uris.is_empty()
    });
    if sources.is_empty() {
        return Err(Error::Value(format!(
            "the stylesheet for {family:?} declares no downloadable fonts"
        )));
    }
    tracing::info!(
        "Stylesheet declares {} styles with {} subsets",
        sources.len(),
        sources.values().map(Vec::len).sum::<usize>()
    );

    let binaries = client.fetch_all(&sources).await?;

    let mut instances = Vec::with_capacity(binaries.len());
    for (key, subsets) in binaries {
        tracing::info!(%key, "Merging {} subsets", subsets.len());
        let data = tokio::task::spawn_blocking(move || merge_subsets(&subsets))
            .await
            .map_err(|e| Error::Aborted(format!("merge of {key} did not finish: {e}")))??;

        let name = local_names
            .get(&key)
            .filter(|names| !names.is_empty())
            .map(select_simplest_name)
            .transpose()?
            .unwrap_or_else(|| key.family.clone());

        instances.push(FontInstance {
            family: key.family.clone(),
            name,
            normalized_weight: key.style.normalized_weight(),
            italic: key.style.italic,
            data,
            key,
        });
    }
    Ok(instances)
}

/// Resolve a `url()` against the stylesheet it came from.
fn resolve(stylesheet: &Url, source: &str) -> Result<String> {
    stylesheet
        .join(source)
        .map(String::from)
        .map_err(|e| Error::Value(format!("invalid font URL {source:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureResponse, FixtureServer, latin_and_greek_subsets};
    use crate::{ClientConfig, FontStyle};
    use fontcull_skrifa::{FontRef, MetadataProvider};

    const CSS: &str = r#"
/* latin */
@font-face {
  font-family: 'Example';
  font-style: normal;
  font-weight: 400;
  src: local('Example Regular'), local('Example-Regular'), url(/fonts/latin.ttf) format('truetype');
  unicode-range: U+0000-00FF;
}
/* greek */
@font-face {
  font-family: 'Example';
  font-style: normal;
  font-weight: 400;
  src: local('Example Regular'), local('Example-Regular'), url(/fonts/greek.ttf) format('truetype');
  unicode-range: U+0370-03FF;
}
@font-face {
  font-family: 'Example';
  font-style: italic;
  font-weight: 700;
  src: url(/fonts/latin.ttf) format('truetype');
}
"#;

    async fn example_server() -> FixtureServer {
        let (latin, greek) = latin_and_greek_subsets();
        FixtureServer::start(vec![
            ("/css", FixtureResponse::ok(CSS.as_bytes().to_vec())),
            ("/fonts/latin.ttf", FixtureResponse::ok(latin)),
            ("/fonts/greek.ttf", FixtureResponse::ok(greek)),
        ])
        .await
    }

    #[tokio::test]
    async fn test_load_selection_end_to_end() {
        let server = example_server().await;
        let client = FontsClient::new(ClientConfig::with_base_url(&server.base_url())).unwrap();

        let instances = load_selection(&client, "Example", None).await.unwrap();
        assert_eq!(instances.len(), 2);

        let regular = &instances[0];
        assert_eq!(regular.key, FontKey::new("Example", FontStyle::REGULAR));
        assert_eq!(regular.family, "Example");
        assert_eq!(regular.name, "Example Regular");
        assert_eq!(regular.normalized_weight, Some(50));
        assert!(!regular.italic);

        let font = FontRef::new(&regular.data).unwrap();
        let charmap = font.charmap();
        assert!(charmap.map('A').is_some());
        assert!(charmap.map('Ω').is_some());

        // no local() names: the family name is used
        let bold_italic = &instances[1];
        assert_eq!(bold_italic.key.to_string(), "Example:700i");
        assert_eq!(bold_italic.name, "Example");
        assert_eq!(bold_italic.normalized_weight, Some(75));
        assert!(bold_italic.italic);
        assert_eq!(bold_italic.data, latin_and_greek_subsets().0);

        // one stylesheet, then every subset once per key, in order
        let paths: Vec<String> = server
            .requests()
            .iter()
            .map(|r| r.split_whitespace().nth(1).unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/css?family=Example:",
                "/fonts/latin.ttf",
                "/fonts/greek.ttf",
                "/fonts/latin.ttf"
            ]
        );
    }

    #[tokio::test]
    async fn test_load_selection_propagates_download_failure() {
        let server = FixtureServer::start(vec![(
            "/css",
            FixtureResponse::ok(
                b"@font-face { font-family: X; src: url(/fonts/gone.woff2); }".to_vec(),
            ),
        )])
        .await;
        let client = FontsClient::new(ClientConfig::with_base_url(&server.base_url())).unwrap();

        let err = load_selection(&client, "X", Some("400")).await.unwrap_err();
        assert!(matches!(err, Error::Network { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_load_selection_without_fonts() {
        let server = FixtureServer::start(vec![(
            "/css",
            FixtureResponse::ok(b"body { color: red; }".to_vec()),
        )])
        .await;
        let client = FontsClient::new(ClientConfig::with_base_url(&server.base_url())).unwrap();

        let err = load_selection(&client, "X", None).await.unwrap_err();
        assert!(matches!(err, Error::Value(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_load_selection_skips_broken_rules() {
        let (latin, _) = latin_and_greek_subsets();
        let server = FixtureServer::start(vec![
            (
                "/css",
                FixtureResponse::ok(
                    b"@font-face { font-family: X; src: local(X Thin), url(/fonts/x.ttf) } junk-without-block"
                        .to_vec(),
                ),
            ),
            ("/fonts/x.ttf", FixtureResponse::ok(latin)),
        ])
        .await;
        let client = FontsClient::new(ClientConfig::with_base_url(&server.base_url())).unwrap();

        let instances = load_selection(&client, "X", None).await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "X Thin");
    }

    #[tokio::test]
    async fn test_load_selection_rejects_unparseable_css() {
        let server = FixtureServer::start(vec![(
            "/css",
            FixtureResponse::ok(b"@font-face { font-family: \xFF; }".to_vec()),
        )])
        .await;
        let client = FontsClient::new(ClientConfig::with_base_url(&server.base_url())).unwrap();

        let err = load_selection(&client, "X", None).await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn test_resolve_relative_sources() {
        let base = Url::parse("https://fonts.example/css?family=A:400").unwrap();
        assert_eq!(
            resolve(&base, "/s/a.woff2").unwrap(),
            "https://fonts.example/s/a.woff2"
        );
        assert_eq!(
            resolve(&base, "https://cdn.example/b.woff2").unwrap(),
            "https://cdn.example/b.woff2"
        );
    }
}
