use crate::shared::config::ConfigError;

/// A rotation restricted to whole quarter turns.
///
/// Construction from raw degrees is the only fallible step, so any frame
/// carrying a `Rotation` is already known to be valid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Parses degrees as reported by a display. Negative and >= 360 values
    /// are normalized as long as they are exact multiples of 90.
    pub fn from_degrees(degrees: i32) -> Result<Self, ConfigError> {
        if degrees % 90 != 0 {
            return Err(ConfigError::InvalidRotation(degrees));
        }
        Ok(match degrees.rem_euclid(360) {
            0 => Rotation::Deg0,
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            _ => Rotation::Deg270,
        })
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Number of clockwise quarter turns.
    pub fn quarter_turns(self) -> u32 {
        self.degrees() / 90
    }

    /// Maps a display rotation to the rotation applied during preprocessing.
    ///
    /// The table is `{0→0, 90→270, 180→180, 270→90}`; the display reports
    /// counter-clockwise surface rotation while the sensor image needs the
    /// opposite turn to become upright.
    pub fn display_to_preprocess(self) -> Rotation {
        match self {
            Rotation::Deg0 => Rotation::Deg0,
            Rotation::Deg90 => Rotation::Deg270,
            Rotation::Deg180 => Rotation::Deg180,
            Rotation::Deg270 => Rotation::Deg90,
        }
    }

    /// True when width and height swap under this rotation.
    pub fn swaps_axes(self) -> bool {
        self.quarter_turns() % 2 == 1
    }
}

impl TryFrom<i32> for Rotation {
    type Error = ConfigError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(90, 270)]
    #[case(180, 180)]
    #[case(270, 90)]
    fn test_display_to_preprocess_table(#[case] display: i32, #[case] expected: u32) {
        let rotation = Rotation::from_degrees(display).unwrap();
        assert_eq!(rotation.display_to_preprocess().degrees(), expected);
    }

    #[rstest]
    #[case::one_degree(1)]
    #[case::forty_five(45)]
    #[case::almost_straight(179)]
    #[case::negative_odd(-30)]
    fn test_non_multiple_of_ninety_is_config_error(#[case] degrees: i32) {
        let err = Rotation::from_degrees(degrees).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRotation(d) if d == degrees));
    }

    #[rstest]
    #[case(360, Rotation::Deg0)]
    #[case(-90, Rotation::Deg270)]
    #[case(450, Rotation::Deg90)]
    fn test_out_of_range_multiples_normalize(#[case] degrees: i32, #[case] expected: Rotation) {
        assert_eq!(Rotation::from_degrees(degrees).unwrap(), expected);
    }

    #[test]
    fn test_quarter_turns() {
        let turns: Vec<u32> = Rotation::ALL.iter().map(|r| r.quarter_turns()).collect();
        assert_eq!(turns, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_swaps_axes_only_for_odd_turns() {
        assert!(!Rotation::Deg0.swaps_axes());
        assert!(Rotation::Deg90.swaps_axes());
        assert!(!Rotation::Deg180.swaps_axes());
        assert!(Rotation::Deg270.swaps_axes());
    }

    #[test]
    fn test_try_from() {
        assert_eq!(Rotation::try_from(180).unwrap(), Rotation::Deg180);
        assert!(Rotation::try_from(100).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Rotation::Deg270.to_string(), "270°");
    }
}
