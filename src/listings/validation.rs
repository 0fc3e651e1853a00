//! Schema checks for inbound submissions.
//!
//! Every rule is evaluated and all violations are reported together in one
//! message; nothing is written unless the whole payload passes.

use lazy_static::lazy_static;
use regex::Regex;

use super::dto::SubmissionRequest;
use super::repo_types::{NewListing, Tag};
use crate::error::{AppError, AppResult};

pub const NAME_MIN_CHARS: usize = 3;
pub const DESCRIPTION_MIN_CHARS: usize = 10;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

fn is_valid_url(url: &str) -> bool {
    lazy_static! {
        static ref URL_RE: Regex = Regex::new(
            r"^https?://[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*(:\d{1,5})?([/?#]\S*)?$"
        )
        .unwrap();
    }
    URL_RE.is_match(url)
}

fn is_data_image(image: &str) -> bool {
    lazy_static! {
        static ref IMAGE_RE: Regex = Regex::new(r"^data:image/[A-Za-z0-9.+-]+;base64,").unwrap();
    }
    IMAGE_RE.is_match(image)
}

/// Length as the visitor's editor sees the raw value: Unicode scalar values,
/// markup included.
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Parses tag names, collapsing duplicates while keeping first-seen order.
pub fn parse_tags<'a, I>(names: I) -> Result<Vec<Tag>, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tags = Vec::new();
    for name in names {
        let tag = name.parse::<Tag>()?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

/// Checks a submission and turns it into the record to insert.
pub fn validate_submission(req: SubmissionRequest) -> AppResult<NewListing> {
    let mut problems: Vec<String> = Vec::new();
    let mut violation = |msg: &str, field: &str| problems.push(format!("{msg} at \"{field}\""));

    if char_len(&req.name) < NAME_MIN_CHARS {
        violation("Name must be at least 3 characters", "name");
    }

    let description_len = char_len(&req.description);
    if description_len < DESCRIPTION_MIN_CHARS {
        violation("Description must be at least 10 characters", "description");
    } else if description_len > DESCRIPTION_MAX_CHARS {
        violation("Description must be less than 500 characters", "description");
    }

    if !is_data_image(&req.image) {
        violation(
            "Invalid image format. Must be a base64 encoded image",
            "image",
        );
    }

    if !is_valid_url(&req.github_link) {
        violation("Must be a valid URL", "githubLink");
    }
    if !is_valid_url(&req.demo_link) {
        violation("Must be a valid URL", "demoLink");
    }

    let twitter_link = req.twitter_link.filter(|t| !t.trim().is_empty());
    if let Some(link) = &twitter_link {
        if !is_valid_url(link) {
            violation("Must be a valid URL", "twitterLink");
        }
    }

    let tags = if req.tags.is_empty() {
        violation("At least one tag is required", "tags");
        Vec::new()
    } else {
        match parse_tags(req.tags.iter().map(String::as_str)) {
            Ok(tags) => tags,
            Err(e) => {
                violation(&format!("Invalid tag: {e}"), "tags");
                Vec::new()
            }
        }
    };

    if req.submitted_by.trim().is_empty() {
        violation("Submitter is required", "submittedBy");
    }

    if !req.terms_accepted {
        violation("You must accept the terms and conditions", "termsAccepted");
    }

    if !problems.is_empty() {
        return Err(AppError::Validation(format!(
            "Validation error: {}",
            problems.join("; ")
        )));
    }

    Ok(NewListing {
        name: req.name,
        description: req.description,
        image: req.image,
        github_link: req.github_link,
        demo_link: req.demo_link,
        twitter_link,
        tags,
        submitted_by: req.submitted_by,
    })
}
