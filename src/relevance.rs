use crate::evidence::{PixelStatistics, RelevanceVerdict};
use crate::hazard::{HazardCategory, StatPredicate, GENERIC_OCEAN_TERMS};

/// 内容匹配门槛：0.9，基本要求图像特征和描述两边都对得上
pub const DEFAULT_THRESHOLD: f64 = 0.9;

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

fn predicate_holds(predicate: StatPredicate, stats: Option<&PixelStatistics>) -> bool {
    // 没有统计量就当没满足，绝不因为缺数据而放行
    let Some(s) = stats else {
        return false;
    };
    match predicate {
        StatPredicate::EdgeVarianceAbove(t) => s.edge_variance > t,
        StatPredicate::SaturationStdDevAbove(t) => s.saturation_std_dev > t,
        StatPredicate::MeanSaturationBelow(t) => s.mean_saturation < t,
    }
}

/// 严格的内容相关性匹配。
///
/// 按所选类别的规则表逐条打分（百分点累加），得分 ≥ 阈值才算匹配。
/// 不匹配时 `reasons` 列出每一条没满足的期望；匹配时只放一句得分摘要。
pub fn match_content(
    category: HazardCategory,
    description: &str,
    stats: Option<&PixelStatistics>,
    threshold: f64,
) -> RelevanceVerdict {
    let profile = category.profile();
    let description = description.to_lowercase();
    let mut points: u32 = 0;
    let mut reasons = Vec::new();

    for rule in profile.stat_rules {
        if predicate_holds(rule.predicate, stats) {
            points += rule.weight;
        } else if let Some(why) = rule.shortfall {
            reasons.push(why.to_string());
        }
    }

    let kw = &profile.description_rule;
    if contains_any(&description, kw.keywords) {
        points += kw.weight;
    } else {
        reasons.push(kw.shortfall.to_string());
    }

    let score = points as f64 / 100.0;
    let matches = score >= threshold;

    if matches {
        reasons = vec![format!(
            "Content analysis score: {points}% (minimum {:.0}% required)",
            threshold * 100.0
        )];
    } else if reasons.is_empty() {
        reasons.push(format!(
            "Image characteristics don't match expected patterns for {category}"
        ));
    }

    RelevanceVerdict {
        matches,
        score,
        reasons,
    }
}

/// 宽松的场景匹配，只看文字。
///
/// - 描述为空：退回看文件名里有没有类别关键词
/// - 描述命中关键词：直接通过
/// - 文件名命中 且 描述里至少有个通用海洋词：也通过
pub fn scenario_match(category: HazardCategory, description: &str, filename: &str) -> bool {
    let keywords = category.profile().scenario_keywords;
    let description = description.to_lowercase();
    let filename = filename.to_lowercase();

    let filename_hit = contains_any(&filename, keywords);
    if description.trim().is_empty() {
        return filename_hit;
    }
    if contains_any(&description, keywords) {
        return true;
    }
    filename_hit && contains_any(&description, GENERIC_OCEAN_TERMS)
}

/// 从文件名和描述里识别出可能的灾害类型（只做诊断，不参与放行）。
///
/// 什么都没识别到、但描述里提到海洋/海岸之类的词时，给出风暴潮/巨浪/洪水三个常见类型。
pub fn detect_categories(filename: &str, description: &str) -> Vec<HazardCategory> {
    let filename = filename.to_lowercase();
    let description = description.to_lowercase();

    let mut detected: Vec<HazardCategory> = HazardCategory::ALL
        .into_iter()
        .filter(|c| {
            let p = c.profile();
            contains_any(&filename, p.filename_terms) || contains_any(&description, p.description_terms)
        })
        .collect();

    if detected.is_empty() && contains_any(&description, GENERIC_OCEAN_TERMS) {
        detected = vec![
            HazardCategory::StormSurge,
            HazardCategory::HighWaves,
            HazardCategory::Flooding,
        ];
    }
    detected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(edge_variance: f64, mean_saturation: f64, saturation_std_dev: f64) -> PixelStatistics {
        PixelStatistics {
            edge_variance,
            mean_saturation,
            saturation_std_dev,
            width: 512,
            height: 384,
        }
    }

    #[test]
    fn tsunami_with_matching_description_passes() {
        let s = stats(250.0, 0.3, 0.1);
        let v = match_content(
            HazardCategory::Tsunami,
            "Tsunami warning issued, evacuation underway",
            Some(&s),
            DEFAULT_THRESHOLD,
        );
        assert!(v.matches);
        assert!((v.score - 1.0).abs() < 1e-12);
        assert_eq!(v.reasons, vec!["Content analysis score: 100% (minimum 90% required)"]);
    }

    #[test]
    fn tsunami_with_unrelated_description_fails() {
        let s = stats(250.0, 0.3, 0.1);
        let v = match_content(HazardCategory::Tsunami, "nice beach day", Some(&s), DEFAULT_THRESHOLD);
        assert!(!v.matches);
        assert_eq!(v.reasons, vec!["Description lacks tsunami-related keywords"]);
    }

    #[test]
    fn missing_statistics_never_auto_pass() {
        for category in HazardCategory::ALL {
            let keyword = category.profile().description_rule.keywords[0];
            let v = match_content(category, keyword, None, DEFAULT_THRESHOLD);
            assert!(!v.matches, "{category} passed without pixel data");
            assert!(!v.reasons.is_empty());
        }
    }

    #[test]
    fn every_category_passes_when_all_expectations_hold() {
        // 统计量同时满足所有规则：边缘很强、饱和度分散、平均饱和度低
        let s = stats(1000.0, 0.1, 0.5);
        for category in HazardCategory::ALL {
            let keyword = category.profile().description_rule.keywords[0];
            let v = match_content(category, &format!("I saw {keyword} here"), Some(&s), DEFAULT_THRESHOLD);
            assert!(v.matches, "{category}: {:?}", v.reasons);
        }
    }

    #[test]
    fn storm_surge_needs_all_three_signals() {
        // 边缘 + 关键词 = 70 分，不够
        let calm = stats(400.0, 0.4, 0.05);
        let v = match_content(HazardCategory::StormSurge, "storm coming", Some(&calm), DEFAULT_THRESHOLD);
        assert!(!v.matches);
        assert!((v.score - 0.7).abs() < 1e-12);
        assert_eq!(
            v.reasons,
            vec!["Color variation suggests calm conditions, not storm surge"]
        );
    }

    #[test]
    fn high_waves_silent_rule_yields_generic_reason() {
        // 边缘 + 关键词满足，饱和度那条不满足但它没有理由文本
        let s = stats(400.0, 0.4, 0.05);
        let v = match_content(HazardCategory::HighWaves, "big wave", Some(&s), DEFAULT_THRESHOLD);
        assert!(!v.matches);
        assert_eq!(
            v.reasons,
            vec!["Image characteristics don't match expected patterns for high-waves"]
        );
    }

    #[test]
    fn scenario_match_rules() {
        // 描述为空看文件名
        assert!(scenario_match(HazardCategory::Flooding, "  ", "flooded_street.jpg"));
        assert!(!scenario_match(HazardCategory::Flooding, "", "IMG_0001.jpg"));
        // 描述命中直接通过
        assert!(scenario_match(HazardCategory::Debris, "Floating trash everywhere", "a.jpg"));
        // 文件名命中 + 通用海洋词
        assert!(scenario_match(HazardCategory::Erosion, "near the sea", "cliff_edge.jpg"));
        assert!(!scenario_match(HazardCategory::Erosion, "near the road", "cliff_edge.jpg"));
        // 都不沾边
        assert!(!scenario_match(HazardCategory::Pollution, "nice sunset", "IMG_1.jpg"));
    }

    #[test]
    fn detection_reads_filename_and_description() {
        let found = detect_categories("oil_spill_2024.jpg", "dead fish on the shore");
        assert_eq!(found, vec![HazardCategory::Pollution, HazardCategory::Wildlife]);

        let fallback = detect_categories("IMG_0001.jpg", "something odd at the beach");
        // "beach" 是 high-waves 的描述词，所以不会走兜底
        assert_eq!(fallback, vec![HazardCategory::HighWaves]);

        let generic = detect_categories("IMG_0001.jpg", "strange colour in the ocean");
        assert_eq!(
            generic,
            vec![HazardCategory::StormSurge, HazardCategory::HighWaves, HazardCategory::Flooding]
        );

        assert!(detect_categories("IMG_0001.jpg", "my cat").is_empty());
    }
}
