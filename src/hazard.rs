use serde::{Deserialize, Serialize};
use std::fmt;

/// 海洋灾害类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HazardCategory {
    Tsunami,
    StormSurge,
    HighWaves,
    Flooding,
    Debris,
    Pollution,
    Erosion,
    Wildlife,
    Other,
}

impl HazardCategory {
    pub const ALL: [HazardCategory; 9] = [
        HazardCategory::Tsunami,
        HazardCategory::StormSurge,
        HazardCategory::HighWaves,
        HazardCategory::Flooding,
        HazardCategory::Debris,
        HazardCategory::Pollution,
        HazardCategory::Erosion,
        HazardCategory::Wildlife,
        HazardCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HazardCategory::Tsunami => "tsunami",
            HazardCategory::StormSurge => "storm-surge",
            HazardCategory::HighWaves => "high-waves",
            HazardCategory::Flooding => "flooding",
            HazardCategory::Debris => "debris",
            HazardCategory::Pollution => "pollution",
            HazardCategory::Erosion => "erosion",
            HazardCategory::Wildlife => "wildlife",
            HazardCategory::Other => "other",
        }
    }

    /// 宽松解析：表单里可能是 `storm-surge`，后端模型用的是 `storm_surge`。
    /// 空串或者不认识的类型一律归到 `Other`，和表单未选类型时的行为一致。
    pub fn parse_lenient(s: &str) -> Self {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .unwrap_or(HazardCategory::Other)
    }

    pub fn profile(&self) -> &'static HazardProfile {
        // ALL 的顺序和 PROFILES 一一对应
        let idx = Self::ALL.iter().position(|c| c == self).unwrap_or(8);
        &PROFILES[idx]
    }
}

impl fmt::Display for HazardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 像素统计量上的一条期望规则。权重用“百分点”整数记，避免 0.4 + 0.5 这类浮点累加误差卡在 0.9 门槛上。
#[derive(Debug, Clone, Copy)]
pub struct StatRule {
    pub predicate: StatPredicate,
    pub weight: u32,
    /// 未满足时给出的解释；`None` 表示这条只加分、不扣理由
    pub shortfall: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub enum StatPredicate {
    EdgeVarianceAbove(f64),
    SaturationStdDevAbove(f64),
    MeanSaturationBelow(f64),
}

#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub keywords: &'static [&'static str],
    pub weight: u32,
    pub shortfall: &'static str,
}

/// 某一类灾害的全部期望：内容相关性规则 + 场景关键词 + 检测词表
#[derive(Debug)]
pub struct HazardProfile {
    pub category: HazardCategory,
    pub stat_rules: &'static [StatRule],
    pub description_rule: KeywordRule,
    /// 宽松的场景匹配用的关键词
    pub scenario_keywords: &'static [&'static str],
    /// 从文件名里识别灾害类型的词
    pub filename_terms: &'static [&'static str],
    /// 从描述里识别灾害类型的词
    pub description_terms: &'static [&'static str],
}

/// 通用的海洋词汇，描述里只要有这些就算“沾边”
pub const GENERIC_OCEAN_TERMS: &[&str] = &["ocean", "coastal", "marine", "sea", "beach"];

const fn edge(threshold: f64, weight: u32, shortfall: &'static str) -> StatRule {
    StatRule {
        predicate: StatPredicate::EdgeVarianceAbove(threshold),
        weight,
        shortfall: Some(shortfall),
    }
}

static PROFILES: [HazardProfile; 9] = [
    HazardProfile {
        category: HazardCategory::Tsunami,
        stat_rules: &[edge(
            200.0,
            50,
            "Image lacks the chaotic edge patterns typical of tsunami damage",
        )],
        description_rule: KeywordRule {
            keywords: &["tsunami", "tidal", "evacuation"],
            weight: 50,
            shortfall: "Description lacks tsunami-related keywords",
        },
        scenario_keywords: &[
            "tsunami", "wave", "tidal", "evacuation", "warning", "coastal", "inundation",
            "flooding", "damage", "seismic", "earthquake", "tidal wave",
        ],
        filename_terms: &["tsunami", "tidal", "seismic"],
        description_terms: &["tsunami", "tidal", "seismic", "earthquake", "evacuation"],
    },
    HazardProfile {
        category: HazardCategory::StormSurge,
        stat_rules: &[
            edge(150.0, 40, "Image appears too smooth for storm surge conditions"),
            StatRule {
                predicate: StatPredicate::SaturationStdDevAbove(0.15),
                weight: 30,
                shortfall: Some("Color variation suggests calm conditions, not storm surge"),
            },
        ],
        description_rule: KeywordRule {
            keywords: &["storm", "hurricane", "cyclone"],
            weight: 30,
            shortfall: "Description lacks storm-related keywords",
        },
        scenario_keywords: &[
            "storm", "surge", "hurricane", "cyclone", "typhoon", "coastal flooding",
            "high water", "storm damage", "storm surge", "coastal flood", "storm water",
            "surge flooding",
        ],
        filename_terms: &["storm", "surge", "hurricane", "cyclone", "typhoon", "coastal_flood"],
        description_terms: &[
            "storm", "surge", "hurricane", "cyclone", "typhoon", "coastal flood", "storm surge",
            "high water", "storm damage",
        ],
    },
    HazardProfile {
        category: HazardCategory::HighWaves,
        stat_rules: &[
            edge(130.0, 50, "Image lacks the dynamic edge patterns of high waves"),
            StatRule {
                predicate: StatPredicate::SaturationStdDevAbove(0.12),
                weight: 20,
                shortfall: None,
            },
        ],
        description_rule: KeywordRule {
            keywords: &["wave", "rough", "swell"],
            weight: 30,
            shortfall: "Description lacks wave-related keywords",
        },
        scenario_keywords: &[
            "wave", "rough", "swell", "surf", "coastal", "beach", "wave damage", "high surf",
            "rough sea", "big waves", "ocean waves", "beach waves",
        ],
        filename_terms: &["wave", "rough", "swell", "surf", "beach_wave"],
        description_terms: &[
            "wave", "rough", "swell", "surf", "beach", "high surf", "wave damage",
        ],
    },
    HazardProfile {
        category: HazardCategory::Flooding,
        stat_rules: &[
            edge(100.0, 40, "Image lacks the patterns typical of flooding"),
            StatRule {
                predicate: StatPredicate::MeanSaturationBelow(0.3),
                weight: 20,
                shortfall: None,
            },
        ],
        description_rule: KeywordRule {
            keywords: &["flood", "water", "inundation"],
            weight: 40,
            shortfall: "Description lacks flood-related keywords",
        },
        scenario_keywords: &[
            "flood", "water", "inundation", "flooded", "waterlogged", "flood damage",
            "rising water", "water level", "flooding", "submerged",
        ],
        filename_terms: &["flood", "water", "inundat", "flooded", "waterlogged"],
        description_terms: &[
            "flood", "water", "inundation", "flooded", "waterlogged", "flood damage",
            "rising water",
        ],
    },
    HazardProfile {
        category: HazardCategory::Debris,
        stat_rules: &[edge(160.0, 50, "Image lacks the scattered edge patterns of debris")],
        description_rule: KeywordRule {
            keywords: &["debris", "trash", "litter"],
            weight: 50,
            shortfall: "Description lacks debris-related keywords",
        },
        scenario_keywords: &[
            "debris", "trash", "litter", "waste", "cleanup", "marine debris", "floating objects",
            "garbage", "rubbish", "floating trash",
        ],
        filename_terms: &["debris", "trash", "litter", "waste", "cleanup"],
        description_terms: &[
            "debris", "trash", "litter", "waste", "cleanup", "marine debris", "floating objects",
        ],
    },
    HazardProfile {
        category: HazardCategory::Pollution,
        stat_rules: &[edge(100.0, 40, "Image lacks the patterns typical of pollution")],
        description_rule: KeywordRule {
            keywords: &["oil", "spill", "pollution"],
            weight: 60,
            shortfall: "Description lacks pollution-related keywords",
        },
        scenario_keywords: &[
            "oil", "spill", "pollution", "contamination", "toxic", "chemical",
            "environmental damage", "oil spill", "water pollution", "contaminated",
        ],
        filename_terms: &["oil", "spill", "pollut", "contamination", "toxic"],
        description_terms: &[
            "oil", "spill", "pollution", "contamination", "toxic", "chemical",
            "environmental damage",
        ],
    },
    HazardProfile {
        category: HazardCategory::Erosion,
        stat_rules: &[edge(
            110.0,
            50,
            "Image lacks the irregular patterns typical of coastal erosion",
        )],
        description_rule: KeywordRule {
            keywords: &["erosion", "coast", "cliff"],
            weight: 50,
            shortfall: "Description lacks erosion-related keywords",
        },
        scenario_keywords: &[
            "erosion", "coast", "cliff", "beach loss", "coastal erosion", "land loss",
            "shoreline", "beach erosion", "coastal damage",
        ],
        filename_terms: &["erosion", "coast", "cliff", "beach_loss", "shoreline"],
        description_terms: &[
            "erosion", "coast", "cliff", "beach loss", "coastal erosion", "land loss",
            "shoreline",
        ],
    },
    HazardProfile {
        category: HazardCategory::Wildlife,
        stat_rules: &[edge(80.0, 40, "Image lacks the patterns typical of wildlife")],
        description_rule: KeywordRule {
            keywords: &["wildlife", "fish", "animal"],
            weight: 60,
            shortfall: "Description lacks wildlife-related keywords",
        },
        scenario_keywords: &[
            "wildlife", "fish", "animal", "marine life", "stranded", "dead", "conservation",
            "habitat", "marine animal", "sea creature",
        ],
        filename_terms: &["wildlife", "fish", "animal", "marine_life", "stranded"],
        description_terms: &[
            "wildlife", "fish", "animal", "marine life", "stranded", "dead", "conservation",
            "habitat",
        ],
    },
    HazardProfile {
        category: HazardCategory::Other,
        stat_rules: &[edge(90.0, 40, "Image lacks the patterns typical of hazards")],
        description_rule: KeywordRule {
            keywords: &["hazard", "emergency", "coastal"],
            weight: 60,
            shortfall: "Description lacks hazard-related keywords",
        },
        scenario_keywords: &[
            "hazard", "emergency", "coastal", "ocean", "marine", "safety", "warning", "danger",
            "risk",
        ],
        // Other 不参与检测
        filename_terms: &[],
        description_terms: &[],
    },
];
