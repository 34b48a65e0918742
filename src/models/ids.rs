//! Composite identity scheme.
//!
//! Every branch-scoped entity has a human-meaningful logical id and a
//! graph-unique id `"{repository}:{branch}:{logicalId}"`. A Repository
//! node's key is `"{repository}:{branch}"`. Logical ids may themselves
//! contain colons: parsing splits off the first two segments and re-joins
//! the remainder.

/// Graph-unique id for a branch-scoped entity.
pub fn gid(repository: &str, branch: &str, logical_id: &str) -> String {
    format!("{repository}:{branch}:{logical_id}")
}

/// Primary key of a Repository node.
pub fn repo_pk(repository: &str, branch: &str) -> String {
    format!("{repository}:{branch}")
}

/// Splits a graph-unique id into `(repository, branch, logicalId)`.
///
/// Returns `None` when the string has fewer than three segments.
pub fn parse_gid(guid: &str) -> Option<(&str, &str, &str)> {
    let mut parts = guid.splitn(3, ':');
    let repository = parts.next()?;
    let branch = parts.next()?;
    let logical_id = parts.next()?;
    if repository.is_empty() || branch.is_empty() {
        return None;
    }
    Some((repository, branch, logical_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gid_roundtrip() {
        let guid = gid("my-repo", "main", "comp-AuthService");
        let (repo, branch, id) = parse_gid(&guid).unwrap();
        assert_eq!((repo, branch, id), ("my-repo", "main", "comp-AuthService"));
        assert_eq!(gid(repo, branch, id), guid);
    }

    #[test]
    fn test_logical_id_may_contain_colons() {
        let guid = gid("repo", "feature/x", "ns:module:Thing");
        let (repo, branch, id) = parse_gid(&guid).unwrap();
        assert_eq!(repo, "repo");
        assert_eq!(branch, "feature/x");
        assert_eq!(id, "ns:module:Thing");
        assert_eq!(gid(repo, branch, id), guid);
    }

    #[test]
    fn test_too_few_segments() {
        assert!(parse_gid("repo:branch").is_none());
        assert!(parse_gid("solo").is_none());
    }

    #[test]
    fn test_empty_prefix_rejected() {
        assert!(parse_gid(":branch:id").is_none());
        assert!(parse_gid("repo::id").is_none());
    }

    #[test]
    fn test_repo_pk_is_gid_prefix() {
        let guid = gid("r", "main", "c1");
        assert!(guid.starts_with(&repo_pk("r", "main")));
    }
}
