use super::{Placement, TerrainElevation};
use crate::camera::{MercatorProjection, SymbolProjection, Transform};
use crate::config::PlacementConfig;
use crate::error::PlacementError;
use crate::geometry::Point;
use crate::symbol::bucket::SymbolBucket;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// Drives placement frame after frame. Only the current placement and the one before it
/// are alive; placing a frame drops the older one.
pub struct PlacementEngine {
    projection: Arc<dyn SymbolProjection>,
    terrain: Option<TerrainElevation>,
    fade_duration: f64,
    cross_source_collisions: bool,
    current: Option<Placement>,
    previous: Option<Placement>,
}

impl PlacementEngine {
    pub fn new(fade_duration_ms: f64, cross_source_collisions: bool) -> Self {
        Self {
            projection: Arc::new(MercatorProjection),
            terrain: None,
            fade_duration: fade_duration_ms,
            cross_source_collisions,
            current: None,
            previous: None,
        }
    }

    pub fn from_config(config: &PlacementConfig) -> Self {
        Self::new(config.fade_duration_ms, config.cross_source_collisions)
    }

    pub fn with_projection(mut self, projection: Arc<dyn SymbolProjection>) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_terrain(mut self, terrain: TerrainElevation) -> Self {
        self.terrain = Some(terrain);
        self
    }

    /// Places every layer for `transform`. Layers are given bottom to top and placed top
    /// first, so upper layers win collisions. The result becomes the current placement
    /// and is not visible to opacity updates until [`commit`](Self::commit).
    pub fn place_frame(
        &mut self,
        transform: Transform,
        layers: &mut [Vec<SymbolBucket>],
        show_collision_boxes: bool,
    ) -> Result<(), PlacementError> {
        let mut placement = Placement::new(
            transform,
            Arc::clone(&self.projection),
            self.terrain.clone(),
            self.fade_duration,
            self.cross_source_collisions,
        );
        self.previous = self.current.take();

        let mut seen_cross_tile_ids = HashSet::new();
        for layer in layers.iter_mut().rev() {
            placement.place_layer(
                layer,
                &mut seen_cross_tile_ids,
                show_collision_boxes,
                self.previous.as_ref(),
            )?;
        }
        log::debug!(
            "frame placed: {} labels, {} visible text",
            placement.placements.len(),
            placement.placements.values().filter(|p| p.text).count()
        );
        self.current = Some(placement);
        Ok(())
    }

    /// Merges the current placement with the previous one. Does nothing before the first
    /// frame.
    pub fn commit(&mut self, now: f64) -> Result<(), PlacementError> {
        let Some(current) = self.current.as_mut() else {
            return Ok(());
        };
        current.commit(now, self.previous.as_ref())?;
        // Fade state now lives in the current placement.
        self.previous = None;
        Ok(())
    }

    pub fn update_layer_opacities(&mut self, buckets: &mut [SymbolBucket]) -> Result<(), PlacementError> {
        match self.current.as_mut() {
            Some(current) => current.update_layer_opacities(buckets),
            None => Ok(()),
        }
    }

    pub fn query_rendered_symbols(&self, polygon: &[Point]) -> BTreeMap<u32, Vec<u32>> {
        self.current
            .as_ref()
            .map(|current| current.query_rendered_symbols(polygon))
            .unwrap_or_default()
    }

    pub fn current(&self) -> Option<&Placement> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&Placement> {
        self.previous.as_ref()
    }

    pub fn has_transitions(&self, now: f64) -> bool {
        self.current.as_ref().is_some_and(|current| current.has_transitions(now))
    }

    pub fn still_recent(&mut self, now: f64, zoom: f64) -> bool {
        self.current
            .as_mut()
            .is_some_and(|current| current.still_recent(now, zoom))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{TestLabel, label_bucket};
    use super::*;
    use crate::symbol::style::SymbolLayout;

    fn layers() -> Vec<Vec<SymbolBucket>> {
        vec![
            vec![label_bucket(1, "source", SymbolLayout::default(), &[TestLabel::new(4096.0, 4096.0, 1)])],
            vec![label_bucket(2, "source", SymbolLayout::default(), &[TestLabel::new(4096.0, 4096.0, 2)])],
        ]
    }

    #[test]
    fn upper_layer_wins() {
        let mut engine = PlacementEngine::new(300.0, true);
        let mut layers = layers();
        engine
            .place_frame(Transform::new(512.0, 512.0), &mut layers, false)
            .expect("frame");
        let current = engine.current().expect("current placement");
        assert!(current.placements[&2].text);
        assert!(!current.placements[&1].text);
    }

    #[test]
    fn keeps_at_most_two_frames() {
        let mut engine = PlacementEngine::new(300.0, true);
        let mut layers = layers();
        assert!(engine.previous().is_none());
        engine.commit(0.0).expect("commit without a frame");

        engine
            .place_frame(Transform::new(512.0, 512.0), &mut layers, false)
            .expect("frame");
        assert!(engine.previous().is_none());
        engine
            .place_frame(Transform::new(512.0, 512.0), &mut layers, false)
            .expect("frame");
        assert!(engine.previous().is_some());

        // The second frame has no committed predecessor to fade from.
        assert_eq!(engine.commit(16.0), Err(PlacementError::MissingPlacementChangeTime));
    }

    #[test]
    fn fades_across_committed_frames() {
        let mut engine = PlacementEngine::new(300.0, true);
        let mut layers = layers();
        let transform = Transform::new(512.0, 512.0);

        let mut last = 0.0;
        for frame in 0..3 {
            let now = f64::from(frame) * 150.0;
            engine.place_frame(transform.clone(), &mut layers, false).expect("frame");
            engine.commit(now).expect("commit");
            for layer in layers.iter_mut() {
                engine.update_layer_opacities(layer).expect("opacities");
            }
            let opacity = engine.current().expect("current").opacities[&2].text.opacity;
            assert!(opacity >= last, "{opacity} < {last}");
            last = opacity;
        }
        assert_eq!(last, 1.0);
        assert_eq!(layers[1][0].text.opacity_vertices, vec![u32::MAX]);
        assert!(!engine.has_transitions(10_000.0));

        let hits = engine.query_rendered_symbols(&[
            Point::new(250.0, 250.0),
            Point::new(262.0, 250.0),
            Point::new(262.0, 262.0),
            Point::new(250.0, 262.0),
        ]);
        assert_eq!(hits.get(&2), Some(&vec![0]));
        assert!(!hits.contains_key(&1));
    }
}
