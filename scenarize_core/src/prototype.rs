// scenarize_core/src/prototype.rs

//! Empty scenario prototypes: a static map plus a deterministic,
//! information-bearing scenario identity derived from the window's time span.

use std::sync::Arc;

use crate::error::{ConvertError, Result};
use crate::scenario::ScenarioId;
use crate::scene::{RecordingMeta, SceneIdentity, StaticScene, StaticSceneProvider};
use crate::window::Window;

/// The static shell dynamic obstacles are later added to.
#[derive(Debug, Clone)]
pub struct ScenarioPrototype {
    pub id: ScenarioId,
    pub dt: f64,
    pub scene: Arc<StaticScene>,
}

/// Dataset collaborator that resolves a recording to its static map and the
/// identity fields the scenario id is derived from.
pub trait MetaScenarioBuilder: Send + Sync {
    fn build(&self, window: &Window, meta: &RecordingMeta) -> Result<MetaScenario>;
}

/// A resolved static map with (possibly recording-specific) identity.
#[derive(Debug, Clone)]
pub struct MetaScenario {
    pub scene: Arc<StaticScene>,
    pub identity: SceneIdentity,
}

/// Standard meta-scenario builder: look the location up in a preloaded scene
/// provider and bind the recording id as the identity's configuration id.
pub struct ProviderMetaScenarioBuilder<P: StaticSceneProvider> {
    provider: P,
}

impl<P: StaticSceneProvider> ProviderMetaScenarioBuilder<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P: StaticSceneProvider> MetaScenarioBuilder for ProviderMetaScenarioBuilder<P> {
    fn build(&self, _window: &Window, meta: &RecordingMeta) -> Result<MetaScenario> {
        let scene = self
            .provider
            .lookup(&meta.location)
            .ok_or_else(|| ConvertError::UnknownLocation(meta.location.clone()))?;
        let mut identity = scene.identity.clone();
        identity.configuration_id = Some(meta.recording_id);
        Ok(MetaScenario { scene, identity })
    }
}

/// Derive the scenario id for a window on a given map.
///
/// The identity's configuration id (or nothing) is decimally concatenated
/// with the window's first time step; the last time step becomes the
/// prediction id. Two windows from the same map that differ in either
/// endpoint therefore receive distinct ids.
pub fn scenario_id_for_window(window: &Window, identity: &SceneIdentity) -> Result<ScenarioId> {
    let (Some(start), Some(end)) = (window.start_step(), window.end_step()) else {
        return Err(ConvertError::MalformedWindow(
            "cannot derive a scenario id from a window without states".into(),
        ));
    };
    let concatenated = format!(
        "{}{}",
        identity
            .configuration_id
            .map(|c| c.to_string())
            .unwrap_or_default(),
        start
    );
    let configuration_id = concatenated.parse::<u64>().map_err(|_| {
        ConvertError::MalformedWindow(format!(
            "cannot encode start step {start} into a configuration id"
        ))
    })?;
    Ok(ScenarioId {
        country: identity.country.clone(),
        map_name: identity.map_name.clone(),
        map_id: identity.map_id,
        obstacle_behavior: "T".into(),
        configuration_id,
        prediction_id: end,
        cooperative: false,
    })
}

/// Builds one [`ScenarioPrototype`] per job by delegating map resolution to
/// the dataset collaborator and stamping the window-derived identity.
pub struct PrototypeBuilder {
    meta_builder: Box<dyn MetaScenarioBuilder>,
}

impl PrototypeBuilder {
    pub fn new(meta_builder: Box<dyn MetaScenarioBuilder>) -> Self {
        Self { meta_builder }
    }

    pub fn build(&self, window: &Window, meta: &RecordingMeta) -> Result<ScenarioPrototype> {
        let meta_scenario = self.meta_builder.build(window, meta)?;
        let id = scenario_id_for_window(window, &meta_scenario.identity)?;
        Ok(ScenarioPrototype {
            id,
            dt: window.dt,
            scene: meta_scenario.scene,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::testing::straight_scene;
    use crate::scene::PreloadedScenes;
    use crate::window::testing::car_window;

    fn identity(configuration_id: Option<u32>) -> SceneIdentity {
        SceneIdentity {
            country: "DEU".into(),
            map_name: "TestStretch".into(),
            map_id: 2,
            configuration_id,
        }
    }

    #[test]
    fn configuration_id_concatenates_recording_and_start_step() {
        let window = car_window(&[(0, &[12, 13, 14])], 1.0);
        let id = scenario_id_for_window(&window, &identity(Some(7))).unwrap();
        assert_eq!(id.configuration_id, 712);
        assert_eq!(id.prediction_id, 14);
    }

    #[test]
    fn missing_configuration_id_uses_the_start_step_alone() {
        let window = car_window(&[(0, &[12, 13, 14])], 1.0);
        let id = scenario_id_for_window(&window, &identity(None)).unwrap();
        assert_eq!(id.configuration_id, 12);
    }

    #[test]
    fn windows_differing_in_either_endpoint_get_distinct_ids() {
        let identity = identity(Some(3));
        let a = scenario_id_for_window(&car_window(&[(0, &[0, 1, 2])], 1.0), &identity).unwrap();
        let b = scenario_id_for_window(&car_window(&[(0, &[1, 2])], 1.0), &identity).unwrap();
        let c = scenario_id_for_window(&car_window(&[(0, &[0, 1])], 1.0), &identity).unwrap();
        assert_ne!(a.to_string(), b.to_string());
        assert_ne!(a.to_string(), c.to_string());
        assert_ne!(b.to_string(), c.to_string());
    }

    #[test]
    fn provider_builder_binds_the_recording_id() {
        let mut provider = PreloadedScenes::default();
        provider.insert("loc1", straight_scene(50.0));
        let builder = PrototypeBuilder::new(Box::new(ProviderMetaScenarioBuilder::new(provider)));
        let window = car_window(&[(0, &[5, 6, 7])], 0.04);
        let meta = RecordingMeta {
            location: "loc1".into(),
            recording_id: 21,
        };
        let prototype = builder.build(&window, &meta).unwrap();
        assert_eq!(prototype.id.configuration_id, 215);
        assert_eq!(prototype.id.prediction_id, 7);
        assert_eq!(prototype.dt, 0.04);
    }

    #[test]
    fn unknown_locations_are_fatal() {
        let builder = PrototypeBuilder::new(Box::new(ProviderMetaScenarioBuilder::new(
            PreloadedScenes::default(),
        )));
        let window = car_window(&[(0, &[0, 1])], 1.0);
        let meta = RecordingMeta {
            location: "nowhere".into(),
            recording_id: 1,
        };
        assert!(matches!(
            builder.build(&window, &meta),
            Err(ConvertError::UnknownLocation(_))
        ));
    }
}
