//! 环境指标采样
//!
//! 为新认养的树分配树种、种植地点和初始环境指标。
//! 采样策略通过 [`MetricSampler`] 注入，测试中可替换为固定种子或自定义实现。

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{SampledTree, TreeLocation, TreeMetrics};

/// 树种目录
pub const SPECIES: &[&str] = &[
    "Quercia",
    "Pino Mediterraneo",
    "Acero",
    "Betulla",
    "Ciliegio",
    "Melo",
    "Olivo",
    "Cipresso",
];

/// 种植地点目录（纬度, 经度）
const PLANTING_SITES: &[(f64, f64)] = &[
    (41.9028, 12.4964), // Roma
    (43.7696, 11.2558), // Firenze
    (45.4642, 9.1900),  // Milano
    (40.8518, 14.2681), // Napoli
    (45.0703, 7.6869),  // Torino
    (44.4949, 11.3426), // Bologna
    (38.1157, 13.3615), // Palermo
    (41.1171, 16.8719), // Bari
];

const PLANTING_COUNTRY: &str = "Italia";

/// 指标采样策略
///
/// 采样不访问存储，也不修改兑换码或账本状态
#[cfg_attr(test, mockall::automock)]
pub trait MetricSampler: Send + Sync {
    /// 生成树种、地点和初始指标，提供树种提示时直接采用
    fn sample(&self, species_hint: Option<String>) -> SampledTree;
}

/// 基于 StdRng 的采样器
///
/// 相同种子产生相同的采样序列
pub struct SeededMetricSampler {
    rng: Mutex<StdRng>,
}

impl SeededMetricSampler {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// 配置了种子时使用固定种子，否则使用系统熵
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::from_entropy(),
        }
    }
}

impl MetricSampler for SeededMetricSampler {
    fn sample(&self, species_hint: Option<String>) -> SampledTree {
        let mut rng = self.rng.lock();

        let species = match species_hint.filter(|s| !s.trim().is_empty()) {
            Some(hint) => hint,
            None => SPECIES[rng.random_range(0..SPECIES.len())].to_string(),
        };

        let (latitude, longitude) = PLANTING_SITES[rng.random_range(0..PLANTING_SITES.len())];

        let metrics = TreeMetrics::new(
            f64::from(rng.random_range(0..=5u32)),
            f64::from(rng.random_range(0..=3u32)),
            f64::from(rng.random_range(0..=50u32)),
            f64::from(rng.random_range(0..=2u32)),
        );

        SampledTree {
            species,
            location: TreeLocation::new(latitude, longitude, PLANTING_COUNTRY),
            metrics,
        }
    }
}
