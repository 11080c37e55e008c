/// Qualitative speed band for a P80 resolution time, named after musical tempos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PerformanceBand {
    /// P80 ≤ 60 days
    Presto,
    /// 60 < P80 ≤ 180 days
    Allegro,
    /// 180 < P80 ≤ 365 days
    Andante,
    /// P80 > 365 days
    Adagio,
}

impl PerformanceBand {
    pub const ALL: [PerformanceBand; 4] = [
        PerformanceBand::Presto,
        PerformanceBand::Allegro,
        PerformanceBand::Andante,
        PerformanceBand::Adagio,
    ];

    /// Band for a P80 value in days. `None` (no resolved issues) and NaN have no band.
    pub fn for_p80(p80_days: Option<f64>) -> Option<Self> {
        let days = p80_days.filter(|d| !d.is_nan())?;
        Some(if days <= 60.0 {
            PerformanceBand::Presto
        } else if days <= 180.0 {
            PerformanceBand::Allegro
        } else if days <= 365.0 {
            PerformanceBand::Andante
        } else {
            PerformanceBand::Adagio
        })
    }

    pub fn quality(&self) -> &'static str {
        match self {
            PerformanceBand::Presto => "Excellent",
            PerformanceBand::Allegro => "Good",
            PerformanceBand::Andante => "Moderate",
            PerformanceBand::Adagio => "Needs Improvement",
        }
    }

    pub fn tempo(&self) -> &'static str {
        match self {
            PerformanceBand::Presto => "Presto",
            PerformanceBand::Allegro => "Allegro",
            PerformanceBand::Andante => "Andante",
            PerformanceBand::Adagio => "Adagio",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            PerformanceBand::Presto => "🏎️",
            PerformanceBand::Allegro => "🚴",
            PerformanceBand::Andante => "🚶",
            PerformanceBand::Adagio => "🐢",
        }
    }

    pub fn range(&self) -> &'static str {
        match self {
            PerformanceBand::Presto => "≤ 60",
            PerformanceBand::Allegro => "61 – 180",
            PerformanceBand::Andante => "181 – 365",
            PerformanceBand::Adagio => "> 365",
        }
    }

    pub fn interpretation(&self) -> &'static str {
        match self {
            PerformanceBand::Presto => {
                "80% of tickets close within two months. Very fast, high performance."
            }
            PerformanceBand::Allegro => {
                "80% close within six months. Fast, responsive, moving quickly."
            }
            PerformanceBand::Andante => {
                "80% close within a year. Moderate pace, with opportunities to accelerate."
            }
            PerformanceBand::Adagio => {
                "20% of tickets take more than a year. Look for bottlenecks or resource gaps."
            }
        }
    }
}

impl std::fmt::Display for PerformanceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.icon(), self.tempo())
    }
}

/// Report cell for an optional band.
pub fn band_label(band: Option<PerformanceBand>) -> String {
    band.map_or_else(|| "N/A".to_string(), |b| b.to_string())
}
