use crate::classify::{classify, top_n, Classification};
use crate::config::{AppConfig, ClassificationConfig};
use crate::data;
use geojson::FeatureCollection;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};

/// One legend row, label and swatch color.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    pub color: String,
}

/// Resolves a classification to its configured fill color.
pub fn fill_color<'a>(cfg: &'a ClassificationConfig, class: &Classification) -> &'a str {
    match class {
        Classification::NoData => &cfg.no_data_color,
        Classification::NoMajority => &cfg.no_majority_color,
        Classification::Majority(field) => cfg
            .category(field)
            .map(|c| c.color.as_str())
            .unwrap_or(&cfg.no_data_color),
    }
}

/// Human-readable label for a classification, used in the legend and popups.
pub fn class_label(cfg: &ClassificationConfig, class: &Classification) -> String {
    match class {
        Classification::NoData => "No Data".to_string(),
        Classification::NoMajority => "No Majority".to_string(),
        Classification::Majority(field) => {
            let label = cfg.category(field).map(|c| c.label.as_str()).unwrap_or(field);
            format!("Majority {}", label)
        }
    }
}

/// Styles every demographic polygon with its classification: simplestyle
/// fill/stroke properties plus the label and top-N ranking a popup needs.
pub fn annotate_demographics(config: &AppConfig, mut fc: FeatureCollection) -> FeatureCollection {
    let cls = &config.classification;
    let rank_keys = cls.rank_keys();

    fc.features.par_iter_mut().for_each(|feature| {
        let record = data::record_from_properties(feature.properties.as_ref(), cls);
        let class = classify(&record, cls.compare_keys());
        let ranked = top_n(&record, &rank_keys, cls.top_n);

        let top: Vec<Value> = ranked
            .iter()
            .map(|entry| {
                let label = cls
                    .category(&entry.category)
                    .map(|c| c.label.as_str())
                    .unwrap_or(entry.category.as_str());
                json!({ "category": entry.category, "label": label, "count": entry.count })
            })
            .collect();

        feature.set_property("fill", fill_color(cls, &class));
        feature.set_property("fill-opacity", 0.7);
        feature.set_property("stroke", "#808080");
        feature.set_property("stroke-width", 2);
        feature.set_property("classification", class_label(cls, &class));
        feature.set_property("top_categories", Value::Array(top));
    });

    fc
}

/// Marker styling for a facility point layer. Site attributes pass through
/// untouched for the front-end to build popups from.
pub fn annotate_facilities(mut fc: FeatureCollection) -> FeatureCollection {
    for feature in &mut fc.features {
        feature.set_property("marker-color", "#FF0000");
        feature.set_property("marker-symbol", "industrial");
    }
    fc
}

/// Legend rows: the no-data swatch, one row per compared category, and the
/// no-majority swatch, in display order.
pub fn legend(cfg: &ClassificationConfig) -> Vec<LegendEntry> {
    let mut entries = vec![LegendEntry {
        label: "No Data".to_string(),
        color: cfg.no_data_color.clone(),
    }];

    for field in &cfg.compare {
        if let Some(cat) = cfg.category(field) {
            entries.push(LegendEntry {
                label: format!("Majority {}", cat.label),
                color: cat.color.clone(),
            });
        }
    }

    entries.push(LegendEntry {
        label: "No Majority".to_string(),
        color: cfg.no_majority_color.clone(),
    });

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CategoryConfig, InputConfig, OutputConfig, ServerConfig};
    use geojson::GeoJson;
    use serde_json::json;

    fn config() -> AppConfig {
        AppConfig {
            input: InputConfig {
                demographics: "unused".into(),
                facilities: vec![],
                id_field: None,
            },
            classification: ClassificationConfig {
                total_field: "B03002_001".to_string(),
                compare: vec!["White".into(), "AA".into(), "Hispanic".into()],
                top_n: 3,
                no_data_color: "#808080".to_string(),
                no_majority_color: "#505050".to_string(),
                categories: vec![
                    CategoryConfig { field: "White".into(), label: "White".into(), color: "#32127A".into() },
                    CategoryConfig { field: "AA".into(), label: "Black".into(), color: "#FA8072".into() },
                    CategoryConfig { field: "Hispanic".into(), label: "Hispanic".into(), color: "#800080".into() },
                ],
            },
            output: OutputConfig { dir: "out".into() },
            server: ServerConfig { port: 0 },
        }
    }

    #[test]
    fn fill_color_follows_palette() {
        let cfg = config();
        let cls = &cfg.classification;
        assert_eq!(fill_color(cls, &Classification::NoData), "#808080");
        assert_eq!(fill_color(cls, &Classification::NoMajority), "#505050");
        assert_eq!(fill_color(cls, &Classification::Majority("AA".into())), "#FA8072");
        // Unknown category falls back to the neutral swatch.
        assert_eq!(fill_color(cls, &Classification::Majority("Asian".into())), "#808080");
    }

    #[test]
    fn class_label_uses_display_names() {
        let cls = &config().classification;
        assert_eq!(class_label(cls, &Classification::Majority("AA".into())), "Majority Black");
        assert_eq!(class_label(cls, &Classification::NoData), "No Data");
        assert_eq!(class_label(cls, &Classification::NoMajority), "No Majority");
    }

    #[test]
    fn legend_covers_every_outcome() {
        let entries = legend(&config().classification);
        let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["No Data", "Majority White", "Majority Black", "Majority Hispanic", "No Majority"]
        );
        assert_eq!(entries[2].color, "#FA8072");
    }

    #[test]
    fn annotation_embeds_style_and_ranking() {
        let fc_json = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]]
                },
                "properties": { "B03002_001": 100, "White": 10, "AA": 50, "Hispanic": 30 }
            }]
        });
        let fc: FeatureCollection =
            fc_json.to_string().parse::<GeoJson>().unwrap().try_into().unwrap();

        let annotated = annotate_demographics(&config(), fc);
        let props = annotated.features[0].properties.as_ref().unwrap();

        assert_eq!(props["fill"], json!("#FA8072"));
        assert_eq!(props["classification"], json!("Majority Black"));

        let top = props["top_categories"].as_array().unwrap();
        assert_eq!(top.len(), 3);
        assert_eq!(top[0]["label"], json!("Black"));
        assert_eq!(top[0]["count"], json!(50.0));
        assert_eq!(top[2]["label"], json!("White"));
    }

    #[test]
    fn facilities_get_marker_styling() {
        let fc_json = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [-83.0, 42.3] },
                "properties": { "SiteSpecificName": "US Ecology", "Address": "6520 Georgia St" }
            }]
        });
        let fc: FeatureCollection =
            fc_json.to_string().parse::<GeoJson>().unwrap().try_into().unwrap();

        let annotated = annotate_facilities(fc);
        let props = annotated.features[0].properties.as_ref().unwrap();
        assert_eq!(props["marker-color"], json!("#FF0000"));
        // Existing attributes survive for popup construction.
        assert_eq!(props["SiteSpecificName"], json!("US Ecology"));
    }
}
