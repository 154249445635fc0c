//! Validation of game-settings patches.
//!
//! A patch is a JSON object from the client. Recognized keys are parsed
//! and bounds-checked; one bad value fails the whole patch (nothing is
//! clamped). Unrecognized keys are dropped silently.

use serde_json::Value;

use crate::{GameSettings, RoomError};

/// Inclusive bounds for each integer setting.
const QUESTIONS_PER_PLAYER: (u32, u32) = (1, 20);
const TURN_TIMEOUT_SEC: (u32, u32) = (5, 60);
const STEAL_TIMEOUT_SEC: (u32, u32) = (3, 30);
const BONUS_FOR_STEAL: (u32, u32) = (0, 5);

/// Validates `patch` against `base` and returns the merged settings.
pub fn apply_settings_patch(
    base: &GameSettings,
    patch: &Value,
) -> Result<GameSettings, RoomError> {
    let Some(map) = patch.as_object() else {
        return Err(RoomError::InvalidSettings(
            "settings patch must be an object".into(),
        ));
    };

    let mut merged = base.clone();
    for (key, value) in map {
        match key.as_str() {
            "questionsPerPlayer" => {
                merged.questions_per_player =
                    bounded_int(key, value, QUESTIONS_PER_PLAYER)?;
            }
            "turnTimeoutSec" => {
                merged.turn_timeout_sec = bounded_int(key, value, TURN_TIMEOUT_SEC)?;
            }
            "stealTimeoutSec" => {
                merged.steal_timeout_sec =
                    bounded_int(key, value, STEAL_TIMEOUT_SEC)?;
            }
            "allowSteal" => {
                merged.allow_steal = value.as_bool().ok_or_else(|| {
                    RoomError::InvalidSettings(format!("{key} must be a boolean"))
                })?;
            }
            "bonusForSteal" => {
                merged.bonus_for_steal = bounded_int(key, value, BONUS_FOR_STEAL)?;
            }
            // Unknown keys are dropped, not rejected.
            _ => {}
        }
    }
    Ok(merged)
}

fn bounded_int(key: &str, value: &Value, (lo, hi): (u32, u32)) -> Result<u32, RoomError> {
    let n = value
        .as_u64()
        .filter(|n| *n <= u32::MAX as u64)
        .ok_or_else(|| {
            RoomError::InvalidSettings(format!("{key} must be an integer"))
        })?;
    let n = n as u32;
    if n < lo || n > hi {
        return Err(RoomError::InvalidSettings(format!(
            "{key} must be between {lo} and {hi}"
        )));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_patch_keeps_base() {
        let base = GameSettings::default();
        let merged = apply_settings_patch(&base, &json!({})).unwrap();
        assert_eq!(merged, base);
    }

    #[test]
    fn test_valid_patch_merges() {
        let base = GameSettings::default();
        let merged = apply_settings_patch(
            &base,
            &json!({"questionsPerPlayer": 2, "allowSteal": false}),
        )
        .unwrap();
        assert_eq!(merged.questions_per_player, 2);
        assert!(!merged.allow_steal);
        // Untouched fields keep their base values.
        assert_eq!(merged.turn_timeout_sec, 30);
    }

    #[test]
    fn test_out_of_range_fails_whole_patch() {
        let base = GameSettings::default();
        let result = apply_settings_patch(
            &base,
            &json!({"turnTimeoutSec": 10, "questionsPerPlayer": 21}),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("questionsPerPlayer"));
        assert!(err.to_string().contains("between 1 and 20"));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let base = GameSettings::default();
        let merged = apply_settings_patch(
            &base,
            &json!({
                "questionsPerPlayer": 20,
                "turnTimeoutSec": 5,
                "stealTimeoutSec": 30,
                "bonusForSteal": 0
            }),
        )
        .unwrap();
        assert_eq!(merged.questions_per_player, 20);
        assert_eq!(merged.turn_timeout_sec, 5);
        assert_eq!(merged.steal_timeout_sec, 30);
        assert_eq!(merged.bonus_for_steal, 0);
    }

    #[test]
    fn test_below_lower_bound_rejected() {
        let base = GameSettings::default();
        assert!(apply_settings_patch(&base, &json!({"turnTimeoutSec": 4})).is_err());
        assert!(apply_settings_patch(&base, &json!({"stealTimeoutSec": 2})).is_err());
        assert!(
            apply_settings_patch(&base, &json!({"questionsPerPlayer": 0})).is_err()
        );
    }

    #[test]
    fn test_wrong_type_rejected() {
        let base = GameSettings::default();
        assert!(
            apply_settings_patch(&base, &json!({"turnTimeoutSec": "30"})).is_err()
        );
        assert!(apply_settings_patch(&base, &json!({"allowSteal": 1})).is_err());
        assert!(
            apply_settings_patch(&base, &json!({"bonusForSteal": -1})).is_err()
        );
    }

    #[test]
    fn test_unknown_keys_silently_dropped() {
        let base = GameSettings::default();
        let merged = apply_settings_patch(
            &base,
            &json!({"difficulty": "extreme", "turnTimeoutSec": 12}),
        )
        .unwrap();
        assert_eq!(merged.turn_timeout_sec, 12);
    }

    #[test]
    fn test_non_object_patch_rejected() {
        let base = GameSettings::default();
        assert!(apply_settings_patch(&base, &json!([1, 2, 3])).is_err());
    }
}
