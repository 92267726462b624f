//! Named filter factories.

use crate::audio::Gain;
use crate::filter::Filter;
use crate::param::AnimatedParam;
use crate::video::{BlurMask, Diffusion, Opacity};
use montage_core::{MontageError, Result};
use montage_gpu::EffectParams;
use std::collections::BTreeMap;
use tracing::debug;

type Factory = Box<dyn Fn(&EffectParams) -> Filter + Send + Sync>;

/// Creates filters by name from flat parameter lists.
pub struct FilterRegistry {
    factories: BTreeMap<String, Factory>,
}

impl FilterRegistry {
    /// Registry with the built-in filters.
    pub fn new() -> Self {
        let mut reg = Self {
            factories: BTreeMap::new(),
        };
        reg.register("blur_mask", |p| {
            let mut f = BlurMask::new(
                p.get_or("radius", 8.0),
                [
                    p.get_or("left", 0.25),
                    p.get_or("right", 0.75),
                    p.get_or("top", 0.25),
                    p.get_or("bottom", 0.75),
                ],
            );
            f.feather = p.get_or("feather", f.feather);
            Filter::video(f)
        });
        reg.register("diffusion", |p| {
            let d = Diffusion::default();
            Filter::video(Diffusion {
                radius: AnimatedParam::constant(p.get_or("radius", 3.0)),
                amount: p.get("amount").map(AnimatedParam::constant).unwrap_or(d.amount),
            })
        });
        reg.register("opacity", |p| {
            Filter::video(Opacity {
                amount: AnimatedParam::constant(p.get_or("amount", 1.0)),
            })
        });
        reg.register("gain", |p| match p.get("db") {
            Some(db) => Filter::audio(Gain::from_db(db)),
            None => Filter::audio(Gain::new(p.get_or("gain", 1.0))),
        });
        reg
    }

    pub fn register(
        &mut self,
        name: &str,
        factory: impl Fn(&EffectParams) -> Filter + Send + Sync + 'static,
    ) {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn create(&self, name: &str, params: &EffectParams) -> Result<Filter> {
        debug!("Creating filter {} with {:?}", name, params);
        self.factories
            .get(name)
            .map(|f| f(params))
            .ok_or_else(|| MontageError::NotFound(format!("filter '{}'", name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let reg = FilterRegistry::new();
        let names: Vec<_> = reg.names().collect();
        assert_eq!(names, ["blur_mask", "diffusion", "gain", "opacity"]);
    }

    #[test]
    fn test_create_by_name() {
        let reg = FilterRegistry::new();
        let f = reg
            .create("gain", &EffectParams::new().with("db", 0.0))
            .unwrap();
        assert!(!f.is_video());
        assert_eq!(f.name(), "gain");
        assert!(reg.create("blur_mask", &EffectParams::new()).unwrap().is_video());
    }

    #[test]
    fn test_unknown_filter() {
        let reg = FilterRegistry::new();
        assert!(matches!(
            reg.create("sepia", &EffectParams::new()),
            Err(MontageError::NotFound(_))
        ));
    }
}
