//! Connection URI helpers.
//!
//! The dump and restore tools take the database name as a separate `--db`
//! or namespace argument, so a database embedded in the URI path must not
//! reach them. These helpers treat the authority as opaque text, which keeps
//! multi-host seed lists (`h1:27017,h2:27017`) and `mongodb+srv` URIs intact.
//!
//! A database in the URI path is also the default `authSource`. Stripping
//! the path drops that default, so users defined on a database other than
//! `admin` need an explicit `authSource=<db>` option in the query string,
//! which is preserved as-is.

/// Parts of a `scheme://authority/path?query` URI, borrowed from the input.
struct UriParts<'a> {
    scheme: &'a str,
    authority: &'a str,
    query: Option<&'a str>,
}

fn split(uri: &str) -> Option<UriParts<'_>> {
    let (scheme, rest) = uri.split_once("://")?;
    if scheme.is_empty() {
        return None;
    }

    let authority_end = rest.find(|c: char| c == '/' || c == '?').unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    if authority.is_empty() {
        return None;
    }

    let query = rest[authority_end..].find('?').map(|i| &rest[authority_end + i..]);

    Some(UriParts {
        scheme,
        authority,
        query,
    })
}

/// Remove the database path from a connection URI.
///
/// Scheme, credentials, hosts and query options are preserved and the path
/// is forced to `/`. Input that does not look like a URI is returned as-is.
pub fn strip_database(uri: &str) -> String {
    match split(uri) {
        Some(parts) => format!(
            "{}://{}/{}",
            parts.scheme,
            parts.authority,
            parts.query.unwrap_or("")
        ),
        None => uri.to_string(),
    }
}

/// `scheme://hosts` without credentials, path or options.
pub fn display_host(uri: &str) -> String {
    match split(uri) {
        Some(parts) => {
            let hosts = parts
                .authority
                .rsplit_once('@')
                .map(|(_, hosts)| hosts)
                .unwrap_or(parts.authority);
            format!("{}://{}", parts.scheme, hosts)
        }
        None => "<unparseable uri>".to_string(),
    }
}

/// The URI with only the password inside its userinfo replaced by `mask`.
///
/// Text elsewhere in the URI is left alone even if it equals the password.
pub fn mask_password(uri: &str, mask: &str) -> String {
    let Some(parts) = split(uri) else {
        return uri.to_string();
    };
    let Some((userinfo, hosts)) = parts.authority.rsplit_once('@') else {
        return uri.to_string();
    };
    let Some((user, password)) = userinfo.split_once(':') else {
        return uri.to_string();
    };
    if password.is_empty() {
        return uri.to_string();
    }

    let rest = &uri[parts.scheme.len() + "://".len() + parts.authority.len()..];
    format!("{}://{}:{}@{}{}", parts.scheme, user, mask, hosts, rest)
}

/// Password embedded in the URI userinfo, if any.
pub fn password(uri: &str) -> Option<&str> {
    let parts = split(uri)?;
    let (userinfo, _) = parts.authority.rsplit_once('@')?;
    let (_, password) = userinfo.split_once(':')?;
    (!password.is_empty()).then_some(password)
}

/// Strings that must never appear in emitted log text for this URI.
///
/// A URI without userinfo carries nothing secret and yields nothing;
/// unparseable input is treated as secret in full.
pub fn secrets(uri: &str) -> Vec<String> {
    let mut secrets = Vec::new();
    if let Some(password) = password(uri) {
        secrets.push(password.to_string());
    }
    let has_userinfo = match split(uri) {
        Some(parts) => parts.authority.contains('@'),
        None => !uri.is_empty(),
    };
    if has_userinfo {
        secrets.push(uri.to_string());
    }
    secrets
}
