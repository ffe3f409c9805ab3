use serde::{Deserialize, Serialize};

use crate::{domain::search_kind::SearchKind, error::SearchError};

const MAX_USER_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
}

impl SearchQuery {
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or_default()
    }

    pub fn course(&self) -> &str {
        self.course.as_deref().unwrap_or_default()
    }
}

/// Body accepted by every `/search/*` endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SearchBody {
    pub role: Option<String>,
    pub city: Option<String>,
    pub course: Option<String>,
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub kind: SearchKind,
    pub user_id: String,
    pub query: SearchQuery,
}

impl SearchRequest {
    pub fn parse(kind: SearchKind, body: SearchBody) -> Result<Self, SearchError> {
        let role = non_blank(body.role);
        let city = non_blank(body.city);
        let course = non_blank(body.course);

        let query = match kind {
            SearchKind::Jobs | SearchKind::Internships => match (role, city) {
                (Some(role), Some(city)) => SearchQuery {
                    role: Some(role),
                    city,
                    course: None,
                },
                _ => return Err(SearchError::validation("Role and City are required.")),
            },
            SearchKind::Colleges => match (course, city) {
                (Some(course), Some(city)) => SearchQuery {
                    role: None,
                    city,
                    course: Some(course),
                },
                _ => return Err(SearchError::validation("City and Course are required.")),
            },
        };

        let user_id = parse_user_id(body.user_id)?;

        Ok(SearchRequest {
            kind,
            user_id,
            query,
        })
    }
}

/// User ids end up inside result file names, so only a conservative
/// character set is accepted.
pub fn parse_user_id(user_id: Option<String>) -> Result<String, SearchError> {
    let Some(user_id) = non_blank(user_id) else {
        return Err(SearchError::validation("User ID is required."));
    };

    let valid_chars = user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    match valid_chars && user_id.len() <= MAX_USER_ID_LEN {
        true => Ok(user_id),
        false => Err(SearchError::validation(
            "User ID may only contain letters, digits, '-' and '_'.",
        )),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{parse_user_id, SearchBody, SearchRequest};
    use crate::{domain::search_kind::SearchKind, error::SearchError};

    fn body(role: Option<&str>, city: Option<&str>, course: Option<&str>, user: Option<&str>) -> SearchBody {
        SearchBody {
            role: role.map(str::to_string),
            city: city.map(str::to_string),
            course: course.map(str::to_string),
            user_id: user.map(str::to_string),
        }
    }

    #[test]
    fn job_request_valid() {
        let request = SearchRequest::parse(
            SearchKind::Jobs,
            body(Some(" Backend Engineer "), Some("Pune"), None, Some("u1")),
        )
        .unwrap();

        assert_eq!(request.user_id, "u1");
        assert_eq!(request.query.role(), "Backend Engineer");
        assert_eq!(request.query.city, "Pune");
        assert_eq!(request.query.course, None);
    }

    #[test]
    fn job_request_missing_role() {
        let result = SearchRequest::parse(
            SearchKind::Jobs,
            body(Some("   "), Some("Pune"), None, Some("u1")),
        );

        assert!(matches!(result, Err(SearchError::Validation(_))));
    }

    #[test]
    fn college_request_needs_course() {
        let missing = SearchRequest::parse(
            SearchKind::Colleges,
            body(Some("Backend Engineer"), Some("Pune"), None, Some("u1")),
        );
        let present = SearchRequest::parse(
            SearchKind::Colleges,
            body(None, Some("Pune"), Some("B.Tech"), Some("u1")),
        )
        .unwrap();

        assert!(matches!(missing, Err(SearchError::Validation(_))));
        assert_eq!(present.query.course(), "B.Tech");
        assert_eq!(present.query.role, None);
    }

    #[test]
    fn missing_user_id_rejected() {
        let result = SearchRequest::parse(
            SearchKind::Internships,
            body(Some("Design"), Some("Delhi"), None, None),
        );

        match result {
            Err(SearchError::Validation(msg)) => assert_eq!(msg, "User ID is required."),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn user_id_path_characters_rejected() {
        assert!(parse_user_id(Some("../../etc/passwd".to_string())).is_err());
        assert!(parse_user_id(Some("a/b".to_string())).is_err());
        assert!(parse_user_id(Some("x".repeat(129))).is_err());
        assert_eq!(
            parse_user_id(Some("65f1c0de_ab-12".to_string())).unwrap(),
            "65f1c0de_ab-12"
        );
    }
}
