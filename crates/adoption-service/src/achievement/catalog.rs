//! 徽章目录

use std::collections::HashSet;

use crate::error::{AdoptionError, Result};
use crate::models::{Badge, BadgeRequirement, RequirementType};

/// 静态徽章目录
///
/// 保持定义顺序，徽章 ID 唯一
#[derive(Debug, Clone)]
pub struct BadgeCatalog {
    badges: Vec<Badge>,
}

impl BadgeCatalog {
    pub fn new(badges: Vec<Badge>) -> Result<Self> {
        let mut seen = HashSet::new();
        for badge in &badges {
            if !seen.insert(badge.id.as_str()) {
                return Err(AdoptionError::InvalidInput(format!(
                    "徽章 ID 重复: {}",
                    badge.id
                )));
            }
        }
        Ok(Self { badges })
    }

    pub fn get(&self, badge_id: &str) -> Option<&Badge> {
        self.badges.iter().find(|b| b.id == badge_id)
    }

    pub fn contains(&self, badge_id: &str) -> bool {
        self.get(badge_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Badge> {
        self.badges.iter()
    }

    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    pub fn len(&self) -> usize {
        self.badges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.badges.is_empty()
    }

    /// 是否只包含按树木数量解锁的徽章
    pub fn only_counts_trees(&self) -> bool {
        self.badges
            .iter()
            .all(|b| b.requirement.requirement_type == RequirementType::Trees)
    }
}

impl Default for BadgeCatalog {
    fn default() -> Self {
        Self {
            badges: default_catalog(),
        }
    }
}

/// 默认徽章目录
pub fn default_catalog() -> Vec<Badge> {
    vec![
        Badge::new(
            "badge-1",
            "Primo Albero",
            "Hai piantato il tuo primo albero!",
            "/badges/first-tree.svg",
            BadgeRequirement::trees(1),
        ),
        Badge::new(
            "badge-2",
            "Amante della Natura",
            "Hai piantato 5 alberi!",
            "/badges/forest-guardian.svg",
            BadgeRequirement::trees(5),
        ),
        Badge::new(
            "badge-3",
            "Guardiano della Foresta",
            "Hai piantato 10 alberi!",
            "/badges/planet-protector.svg",
            BadgeRequirement::trees(10),
        ),
        Badge::new(
            "badge-4",
            "Eroe della Foresta",
            "Hai piantato 20 alberi!",
            "/badges/earth-hero.svg",
            BadgeRequirement::trees(20),
        ),
    ]
}
