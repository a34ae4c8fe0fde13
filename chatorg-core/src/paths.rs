/// Endpoint templates, relative to the configured origin.
///
/// `{name}` segments are substituted with percent-encoded parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPaths {
    pub conversations: String,
    pub conversation: String,
    pub gizmos_root: String,
    pub gizmos_sidebar: String,
    pub gizmo_conversations: String,
    pub ui_conversation: String,
    pub ui_gizmo: String,
}

impl Default for ApiPaths {
    fn default() -> Self {
        Self {
            conversations: "/backend-api/conversations".into(),
            conversation: "/backend-api/conversation/{id}".into(),
            gizmos_root: "/backend-api/gizmos".into(),
            gizmos_sidebar: "/backend-api/gizmos/snorlax/sidebar".into(),
            gizmo_conversations: "/backend-api/gizmos/{id}/conversations".into(),
            ui_conversation: "/c/{id}".into(),
            ui_gizmo: "/g/{short_url}".into(),
        }
    }
}

pub(crate) fn template_segments<'a>(
    template: &'a str,
    params: &'a [(&'a str, &'a str)],
) -> impl Iterator<Item = &'a str> + 'a {
    template
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(move |segment| {
            match segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
            {
                Some(name) => params
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| *value)
                    .unwrap_or(""),
                None => segment,
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_named_segments() {
        let segments: Vec<_> =
            template_segments("/backend-api/gizmos/{id}/conversations", &[("id", "g-p-1")])
                .collect();
        assert_eq!(segments, vec!["backend-api", "gizmos", "g-p-1", "conversations"]);
    }

    #[test]
    fn missing_parameter_becomes_empty_segment() {
        let segments: Vec<_> = template_segments("/c/{id}", &[]).collect();
        assert_eq!(segments, vec!["c", ""]);
    }
}
