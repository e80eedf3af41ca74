//! Slash-delimited pointer handling.
//!
//! Pointers address nodes in a document tree: `/a/b/0`. The root is `/`.
//! Scopes are pointers too; contract-relative pointers resolve against the
//! owning scope with [`resolve`] and are reported back to observers with
//! [`relativize`].
//!
//! Normalization collapses duplicate and trailing slashes and guarantees a
//! leading slash, so two spellings of the same path compare equal.

/// The list-append token, valid only as the final segment of an ADD patch.
pub const APPEND_TOKEN: &str = "-";

/// Normalizes a pointer: leading slash, no duplicate or trailing slashes.
///
/// Empty input and `/` both normalize to `/`.
#[must_use]
pub fn normalize(pointer: &str) -> String {
    let mut out = String::with_capacity(pointer.len() + 1);
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Resolves a scope-relative pointer to an absolute one.
///
/// The relative pointer uses absolute spelling within its scope (`/x/y`);
/// `/` or an empty pointer resolves to the scope itself.
#[must_use]
pub fn resolve(scope: &str, relative: &str) -> String {
    let scope = normalize(scope);
    let relative = normalize(relative);
    if relative == "/" {
        return scope;
    }
    if scope == "/" {
        return relative;
    }
    normalize(&format!("{scope}{relative}"))
}

/// Rewrites an absolute pointer relative to an observing scope.
///
/// A pointer outside the scope is returned unchanged; the scope root itself
/// relativizes to `/`.
#[must_use]
pub fn relativize(scope: &str, absolute: &str) -> String {
    let scope = normalize(scope);
    let absolute = normalize(absolute);
    if scope == "/" {
        return absolute;
    }
    if absolute == scope {
        return "/".to_string();
    }
    match absolute.strip_prefix(&format!("{scope}/")) {
        Some(rest) => format!("/{rest}"),
        None => absolute,
    }
}

/// Returns whether `target` equals `root` or lies underneath it.
#[must_use]
pub fn is_inside(target: &str, root: &str) -> bool {
    let target = normalize(target);
    let root = normalize(root);
    if root == "/" {
        return true;
    }
    target == root || target.starts_with(&format!("{root}/"))
}

/// Splits a normalized pointer into its segments. The root has none.
#[must_use]
pub fn segments(pointer: &str) -> Vec<String> {
    normalize(pointer)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the parent pointer, or `None` for the root.
#[must_use]
pub fn parent(pointer: &str) -> Option<String> {
    let normalized = normalize(pointer);
    if normalized == "/" {
        return None;
    }
    let cut = normalized.rfind('/').unwrap_or(0);
    if cut == 0 {
        Some("/".to_string())
    } else {
        Some(normalized[..cut].to_string())
    }
}

/// Ancestor pointers of `pointer`, nearest first, ending with `/`.
///
/// The pointer itself is not included.
#[must_use]
pub fn ancestors(pointer: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = normalize(pointer);
    while let Some(up) = parent(&current) {
        out.push(up.clone());
        current = up;
    }
    out
}

/// Nesting depth of a pointer: `/` is 0, `/a` is 1, `/a/b` is 2.
#[must_use]
pub fn depth(pointer: &str) -> usize {
    segments(pointer).len()
}
