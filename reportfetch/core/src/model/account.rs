use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Account id could not be normalized into a plain run of digits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid account id '{0}': expected digits optionally separated by '-'")]
pub struct InvalidAccountId(pub String);

/// Identifier of a single advertising account
///
/// Ids are normalized on construction: dashes and surrounding whitespace are stripped so that
/// `123-456-7890` and `1234567890` refer to the same account
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for AccountId {
    type Err = InvalidAccountId;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().replace('-', "");

        if normalized.is_empty() || !normalized.chars().all(|c| c.is_ascii_digit()) {
            return Err(InvalidAccountId(raw.to_string()));
        }

        Ok(Self(normalized))
    }
}

impl TryFrom<&str> for AccountId {
    type Error = InvalidAccountId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        // credential files commonly carry ids as bare integers
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };

        raw.parse().map_err(D::Error::custom)
    }
}

/// The account(s) a run starts from
///
/// A seed keeps the shape it was given in: a single id (possibly a manager account) or an explicit
/// list of ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountSeed {
    Single(AccountId),
    Many(Vec<AccountId>),
}

impl AccountSeed {
    /// Parse a comma separated list of ids, a single id stays `Single`
    ///
    /// Repeated ids are dropped, the first occurrence keeps its position
    pub fn parse(raw: &str) -> Result<Self, InvalidAccountId> {
        let mut ids: Vec<AccountId> = Vec::new();
        for part in raw.split(',').filter(|part| !part.trim().is_empty()) {
            let id = AccountId::from_str(part)?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        match <[AccountId; 1]>::try_from(ids) {
            Ok([id]) => Ok(Self::Single(id)),
            Err(ids) if ids.is_empty() => Err(InvalidAccountId(raw.to_string())),
            Err(ids) => Ok(Self::Many(ids)),
        }
    }

    pub fn ids(&self) -> &[AccountId] {
        match self {
            Self::Single(id) => std::slice::from_ref(id),
            Self::Many(ids) => ids.as_slice(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

impl From<AccountId> for AccountSeed {
    fn from(id: AccountId) -> Self {
        Self::Single(id)
    }
}

impl fmt::Display for AccountSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .ids()
            .iter()
            .map(AccountId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        f.write_str(&joined)
    }
}

/// Deduplicated set of directly queryable accounts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafAccountSet(BTreeSet<AccountId>);

impl LeafAccountSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: &AccountId) -> bool {
        self.0.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountId> {
        self.0.iter()
    }
}

impl FromIterator<AccountId> for LeafAccountSet {
    fn from_iter<T: IntoIterator<Item = AccountId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a LeafAccountSet {
    type Item = &'a AccountId;
    type IntoIter = std::collections::btree_set::Iter<'a, AccountId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for LeafAccountSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(AccountId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        f.write_str(&joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1234567890", "1234567890")]
    #[case("123-456-7890", "1234567890")]
    #[case(" 42 ", "42")]
    fn test_account_id_normalization(#[case] raw: &str, #[case] expected: &str) {
        let id: AccountId = raw.parse().unwrap();
        assert_eq!(id.as_str(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("12a4")]
    #[case("--")]
    fn test_account_id_rejects_garbage(#[case] raw: &str) {
        assert!(raw.parse::<AccountId>().is_err());
    }

    #[test]
    fn test_seed_keeps_shape() {
        let single = AccountSeed::parse("123").unwrap();
        assert!(matches!(single, AccountSeed::Single(_)));

        let many = AccountSeed::parse("123,456").unwrap();
        assert!(matches!(many, AccountSeed::Many(ref ids) if ids.len() == 2));
        assert_eq!(many.to_string(), "123,456");

        assert!(AccountSeed::parse(" , ").is_err());
    }

    #[test]
    fn test_seed_drops_repeated_ids() {
        let seed = AccountSeed::parse("456,123,456,1-23").unwrap();
        assert_eq!(seed.to_string(), "456,123");

        let single = AccountSeed::parse("1,1").unwrap();
        assert!(matches!(single, AccountSeed::Single(ref id) if id.as_str() == "1"));
    }

    #[test]
    fn test_seed_deserializes_numbers_and_lists() {
        let single: AccountSeed = serde_json::from_str("1234567890").unwrap();
        assert_eq!(single, AccountSeed::Single("1234567890".parse().unwrap()));

        let many: AccountSeed = serde_json::from_str(r#"["123-4", 567]"#).unwrap();
        assert_eq!(
            many,
            AccountSeed::Many(vec!["1234".parse().unwrap(), "567".parse().unwrap()])
        );
    }

    #[test]
    fn test_leaf_set_deduplicates() {
        let set = ["2", "1", "2", "3"]
            .into_iter()
            .map(|id| id.parse::<AccountId>().unwrap())
            .collect::<LeafAccountSet>();

        assert_eq!(set.len(), 3);
        assert_eq!(set.to_string(), "1,2,3");
    }
}
