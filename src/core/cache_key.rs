//! Purpose: Derive the cache key that identifies one query's memoized payload.
//! Exports: `canonical_encoding`, `derive_key`.
//! Role: Pure function of a `QuerySpec`; used by the executor before lookup and after execution.
//! Invariants: Encoding is structural (field names, clause lists in insertion order), so distinct
//! specs never alias; the key is lowercase SHA-256 hex and therefore safe as a file name.
use sha2::{Digest, Sha256};

use crate::core::error::{Error, ErrorKind};
use crate::core::query::QuerySpec;

pub fn canonical_encoding(spec: &QuerySpec) -> Result<String, Error> {
    serde_json::to_string(spec).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode query for cache key")
            .with_source(err)
    })
}

pub fn derive_key(spec: &QuerySpec) -> Result<String, Error> {
    let encoded = canonical_encoding(spec)?;
    let digest = Sha256::digest(encoded.as_bytes());
    let mut key = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        key.push_str(&format!("{byte:02x}"));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::{canonical_encoding, derive_key};
    use crate::core::query::QuerySpec;

    #[test]
    fn same_spec_same_key() {
        let a = QuerySpec::new().from("videos").where_("year", "2013").limit(3);
        let b = QuerySpec::new().from("videos").where_("year", "2013").limit(3);
        assert_eq!(derive_key(&a).unwrap(), derive_key(&b).unwrap());
        assert_eq!(derive_key(&a).unwrap().len(), 64);
    }

    #[test]
    fn scalar_call_order_does_not_matter() {
        let a = QuerySpec::new().from("videos").limit(3).offset(1);
        let b = QuerySpec::new().offset(1).from("videos").limit(3);
        assert_eq!(derive_key(&a).unwrap(), derive_key(&b).unwrap());
    }

    #[test]
    fn concatenation_lookalikes_get_distinct_keys() {
        // Plain name+value concatenation would render both as "a1b".
        let a = QuerySpec::new().from("t").where_("a", "1b");
        let b = QuerySpec::new().from("t").where_("a1", "b");
        assert_ne!(derive_key(&a).unwrap(), derive_key(&b).unwrap());
    }

    #[test]
    fn clause_order_and_value_types_are_part_of_the_key() {
        let a = QuerySpec::new().from("t").sort_asc(["year", "month"]);
        let b = QuerySpec::new().from("t").sort_asc(["month", "year"]);
        assert_ne!(derive_key(&a).unwrap(), derive_key(&b).unwrap());

        let a = QuerySpec::new().from("t").where_("n", 1);
        let b = QuerySpec::new().from("t").where_("n", "1");
        assert_ne!(
            canonical_encoding(&a).unwrap(),
            canonical_encoding(&b).unwrap()
        );
    }
}
