use std::collections::BTreeSet;
use std::sync::Arc;

use crate::models::{Item, PageResult};

/// Client-only narrowing of an already fetched page.
///
/// Pagination totals come from the server and are never adjusted here, so a
/// refined page can show fewer rows while the pager still reports more pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Refinement {
    pub rank_tier: Option<String>,
    pub tag: Option<String>,
}

impl Refinement {
    pub fn is_active(&self) -> bool {
        self.rank_tier.is_some() || self.tag.is_some()
    }

    pub fn clear(&mut self) {
        self.rank_tier = None;
        self.tag = None;
    }

    pub fn matches(&self, item: &Item) -> bool {
        let tier_ok = self
            .rank_tier
            .as_ref()
            .map_or(true, |tier| item.rank.as_ref() == Some(tier));
        let tag_ok = self
            .tag
            .as_ref()
            .map_or(true, |tag| item.top_champions.contains(tag));
        tier_ok && tag_ok
    }

    /// Items of `page` satisfying every active predicate, in server order.
    pub fn apply(&self, page: &PageResult) -> Vec<Arc<Item>> {
        page.items
            .iter()
            .filter(|item| self.matches(item))
            .cloned()
            .collect()
    }
}

/// Values the refinement controls can offer, computed from the current page
/// only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefinementChoices {
    pub rank_tiers: BTreeSet<String>,
    pub tags: BTreeSet<String>,
}

impl RefinementChoices {
    pub fn from_page(page: &PageResult) -> Self {
        let mut choices = Self::default();
        for item in &page.items {
            if let Some(rank) = &item.rank {
                choices.rank_tiers.insert(rank.clone());
            }
            choices.tags.extend(item.top_champions.iter().cloned());
        }
        choices
    }
}
