//! Keyword references in markdown bodies.
//!
//! `` `*Button` `` becomes a link to whatever the keyword resolves to. The
//! referenced keyword is recorded on the entity whether or not it resolves,
//! so the entity is rebuilt once the keyword appears.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::entity::{EntityCore, EntityStore, KeywordTarget};

static KEYWORD_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`\*([A-Za-z0-9_.:#-]+)`").expect("keyword pattern is valid"));

/// Replace keyword references in `markdown` with markdown links.
pub fn link_keywords(markdown: &str, core: &EntityCore, store: &EntityStore) -> String {
    KEYWORD_REF
        .replace_all(markdown, |caps: &Captures| {
            let keyword = &caps[1];
            core.use_keyword(keyword);
            match store.resolve_keyword(keyword) {
                Some(KeywordTarget::Entity(entity)) => match entity.route() {
                    Some(route) => format!("[`{keyword}`]({route})"),
                    None => format!("`{keyword}`"),
                },
                Some(KeywordTarget::External(url)) => format!("[`{keyword}`]({url})"),
                None => {
                    crate::debug!("keyword"; "unresolved `{}` in `{}`", keyword, core.id());
                    format!("`{keyword}`")
                }
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::testing::TestEntity;
    use crate::entity::EntityId;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_links_and_records_keywords() {
        let store = EntityStore::new();
        store.add(TestEntity::new("button").with_keywords(&["Button"]).into_ref());
        let mut external = FxHashMap::default();
        external.insert("Rust".to_string(), "https://www.rust-lang.org".to_string());
        store.update_keyword_map(&external);

        let core = EntityCore::new(EntityId::new("page"), vec![]);
        let out = link_keywords("See `*Button`, `*Rust` and `*Nope`. `plain`", &core, &store);

        // TestEntity has no route, so the entity keyword stays code.
        assert_eq!(
            out,
            "See `Button`, [`Rust`](https://www.rust-lang.org) and `Nope`. `plain`"
        );
        assert_eq!(core.used_keywords(), vec!["Button", "Nope", "Rust"]);
    }
}
