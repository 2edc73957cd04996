/// Class of keychain item a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClass {
    Identity,
    Certificate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLimit {
    One,
    All,
}

impl MatchLimit {
    /// Truncates an ordered result set to this limit.
    pub fn apply<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        match self {
            Self::One => &items[..items.len().min(1)],
            Self::All => items,
        }
    }
}

/// Search criteria handed to the native store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCriteria {
    pub item_class: ItemClass,
    pub match_limit: MatchLimit,
    pub return_attributes: bool,
    pub return_reference: bool,
}

/// Every identity in the keychain, with both attributes and item references.
///
/// The locator reads labels from the attributes and retains the references
/// from the same result set; there is no second query.
pub fn identity_search_criteria() -> QueryCriteria {
    QueryCriteria {
        item_class: ItemClass::Identity,
        match_limit: MatchLimit::All,
        return_attributes: true,
        return_reference: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_search_criteria() {
        let criteria = identity_search_criteria();
        assert_eq!(criteria.item_class, ItemClass::Identity);
        assert_eq!(criteria.match_limit, MatchLimit::All);
        assert!(criteria.return_attributes);
        assert!(criteria.return_reference);
    }

    #[test]
    fn test_match_limit_apply() {
        let items = [1, 2, 3];
        assert_eq!(MatchLimit::One.apply(&items), &[1]);
        assert_eq!(MatchLimit::All.apply(&items), &[1, 2, 3]);
        assert!(MatchLimit::One.apply::<i32>(&[]).is_empty());
    }
}
