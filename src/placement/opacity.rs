// Fade state carried between placement commits.

use serde::Serialize;

/// Packed opacity of a glyph that is fully faded out and not placed.
pub const PACKED_HIDDEN_OPACITY: u32 = 0;

/// Fade accumulator for one half (text or icon) of a label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OpacityState {
    pub opacity: f64,
    /// Fade target: `true` fades in, `false` fades out.
    pub placed: bool,
}

impl OpacityState {
    /// Steps `prev` by `increment` toward its own previous target. Without history the
    /// state starts fully visible only when placed and allowed to skip the fade.
    pub fn new(prev: Option<&OpacityState>, increment: f64, placed: bool, skip_fade: bool) -> Self {
        let opacity = match prev {
            Some(prev) => {
                let step = if prev.placed { increment } else { -increment };
                (prev.opacity + step).clamp(0.0, 1.0)
            }
            None if skip_fade && placed => 1.0,
            None => 0.0,
        };
        Self { opacity, placed }
    }

    pub fn is_hidden(&self) -> bool {
        self.opacity == 0.0 && !self.placed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JointOpacityState {
    pub text: OpacityState,
    pub icon: OpacityState,
}

impl JointOpacityState {
    pub fn new(
        prev: Option<&JointOpacityState>,
        increment: f64,
        placed_text: bool,
        placed_icon: bool,
        skip_fade: bool,
    ) -> Self {
        Self {
            text: OpacityState::new(prev.map(|p| &p.text), increment, placed_text, skip_fade),
            icon: OpacityState::new(prev.map(|p| &p.icon), increment, placed_icon, skip_fade),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.text.is_hidden() && self.icon.is_hidden()
    }
}

/// Outcome of one placement pass for a cross-tile ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JointPlacement {
    pub text: bool,
    pub icon: bool,
    /// Set for labels outside the viewport but inside the collision padding: they can
    /// appear at full opacity once panned in.
    pub skip_fade: bool,
}

impl JointPlacement {
    pub fn new(text: bool, icon: bool, skip_fade: bool) -> Self {
        Self { text, icon, skip_fade }
    }
}

/// Packs an opacity state into one byte, repeated for the four corners of a quad.
/// Each byte holds the opacity in its upper seven bits and the target in the lowest.
pub fn pack_opacity(state: &OpacityState) -> u32 {
    if state.opacity == 0.0 && !state.placed {
        return PACKED_HIDDEN_OPACITY;
    }
    if state.opacity == 1.0 && state.placed {
        return u32::MAX;
    }
    let target = u32::from(state.placed);
    let bits = (state.opacity * 127.0).floor() as u32;
    let byte = (bits << 1) | target;
    byte << 24 | byte << 16 | byte << 8 | byte
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_state_depends_on_skip_fade() {
        assert_eq!(OpacityState::new(None, 0.5, true, true).opacity, 1.0);
        assert_eq!(OpacityState::new(None, 0.5, true, false).opacity, 0.0);
        assert_eq!(OpacityState::new(None, 0.5, false, true).opacity, 0.0);
    }

    #[test]
    fn fade_steps_are_bounded_and_monotonic() {
        let increment = 0.3;
        let mut state = OpacityState::new(None, increment, true, false);
        let mut previous = state.opacity;
        for _ in 0..6 {
            state = OpacityState::new(Some(&state), increment, true, false);
            assert!((0.0..=1.0).contains(&state.opacity), "{}", state.opacity);
            assert!(state.opacity >= previous);
            assert!(state.opacity - previous <= increment + 1e-12);
            previous = state.opacity;
        }
        assert_eq!(state.opacity, 1.0);

        for _ in 0..6 {
            state = OpacityState::new(Some(&state), increment, false, false);
            assert!(state.opacity <= previous);
            assert!(previous - state.opacity <= increment + 1e-12);
            previous = state.opacity;
        }
        assert!(state.is_hidden());
    }

    #[test]
    fn step_follows_previous_target_not_new_one() {
        let prev = OpacityState {
            opacity: 0.5,
            placed: true,
        };
        let next = OpacityState::new(Some(&prev), 0.25, false, false);
        assert_eq!(next.opacity, 0.75);
        assert!(!next.placed);
    }

    #[test]
    fn joint_state_is_hidden_only_when_both_are() {
        let state = JointOpacityState::new(None, 1.0, true, false, true);
        assert!(!state.is_hidden());
        assert!(state.icon.is_hidden());
        let faded = JointOpacityState::new(Some(&state), 1.0, false, false, false);
        assert!(!faded.is_hidden());
        let gone = JointOpacityState::new(Some(&faded), 1.0, false, false, false);
        assert!(gone.is_hidden());
    }

    #[test]
    fn packing_extremes_and_midpoint() {
        let hidden = OpacityState {
            opacity: 0.0,
            placed: false,
        };
        assert_eq!(pack_opacity(&hidden), PACKED_HIDDEN_OPACITY);
        let shown = OpacityState {
            opacity: 1.0,
            placed: true,
        };
        assert_eq!(pack_opacity(&shown), u32::MAX);

        let half = OpacityState {
            opacity: 0.5,
            placed: true,
        };
        // floor(0.5 * 127) = 63 -> byte 0b0111_1111
        assert_eq!(pack_opacity(&half), 0x7F7F_7F7F);

        let fading_in = OpacityState {
            opacity: 0.0,
            placed: true,
        };
        assert_eq!(pack_opacity(&fading_in), 0x0101_0101);
    }
}
