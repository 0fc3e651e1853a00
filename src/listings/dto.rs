use serde::Deserialize;

/// Public submission form. Every field defaults so that missing input is
/// reported by validation rather than by the JSON decoder.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionRequest {
    pub name: String,
    pub description: String,
    pub image: String,
    pub github_link: String,
    pub demo_link: String,
    pub twitter_link: Option<String>,
    pub tags: Vec<String>,
    pub submitted_by: String,
    pub terms_accepted: bool,
}

/// `GET /products` query string. `tags` is a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub tag: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
}

/// `GET /admin/products` query string.
#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub status: String,
}
