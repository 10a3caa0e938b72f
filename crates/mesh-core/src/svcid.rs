//! Service-ID grammar: `name#index@group`.

/// Errors from [`parse_svc_id`].
///
/// When BOTH `#` and `@` are missing, the missing-`@` error is reported —
/// this mirrors the original implementation, which runs the two presence
/// checks unconditionally in sequence and lets the second overwrite the
/// first. Preserved here rather than "fixed" since nothing in the spec
/// calls out this ordering as a redesign target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SvcIdError {
    #[error("missing '#' in svcid '{0}'")]
    MissingSharp(String),
    #[error("missing '@' in svcid '{0}'")]
    MissingAt(String),
    #[error("invalid index in svcid '{0}'")]
    InvalidIndex(String),
}

/// Build a service ID string from its components.
pub fn make_svc_id(name: &str, index: i32, group: &str) -> String {
    format!("{name}#{index}@{group}")
}

/// Parse a service ID into `(name, index, group)`. Total: rejects any
/// input missing `#` or `@`.
pub fn parse_svc_id(svc_id: &str) -> Result<(String, i32, String), SvcIdError> {
    let sharp_pos = svc_id.find('#');
    let at_pos = svc_id.find('@');

    let mut name = String::new();
    let mut group = String::new();
    let mut index = 0i32;

    if let Some(at) = at_pos {
        group = svc_id[at + 1..].to_owned();
        if let Some(sharp) = sharp_pos {
            name = svc_id[..sharp].to_owned();
            index = svc_id[sharp + 1..at]
                .parse()
                .map_err(|_| SvcIdError::InvalidIndex(svc_id.to_owned()))?;
        }
    } else if let Some(sharp) = sharp_pos {
        name = svc_id[..sharp].to_owned();
    }

    // Both presence checks run unconditionally, in this order, so that if
    // both are missing the second (MissingAt) is the one returned.
    let mut err = None;
    if sharp_pos.is_none() {
        err = Some(SvcIdError::MissingSharp(svc_id.to_owned()));
    }
    if at_pos.is_none() {
        err = Some(SvcIdError::MissingAt(svc_id.to_owned()));
    }
    if let Some(e) = err {
        return Err(e);
    }

    Ok((name, index, group))
}
