/// Query parameters accepted by the `vegobjekter` collection endpoint.
///
/// Unset parameters are left out of the request entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pub inkluder: Option<String>,
    pub srid: Option<String>,
    pub segmentering: Option<String>,
    pub trafikantgruppe: Option<String>,
    pub fylke: Option<String>,
    pub endret_etter: Option<String>,
}

impl QueryParams {
    pub fn to_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("inkluder", &self.inkluder),
            ("srid", &self.srid),
            ("segmentering", &self.segmentering),
            ("trafikantgruppe", &self.trafikantgruppe),
            ("fylke", &self.fylke),
            ("endret_etter", &self.endret_etter),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|value| (name, value)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_params_are_omitted() {
        let params = QueryParams {
            inkluder: Some("alle".to_string()),
            fylke: Some("50".to_string()),
            ..Default::default()
        };
        assert_eq!(params.to_pairs(), vec![("inkluder", "alle"), ("fylke", "50")]);
    }

    #[test]
    fn test_default_params_send_nothing() {
        assert!(QueryParams::default().to_pairs().is_empty());
    }
}
