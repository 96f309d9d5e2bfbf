//! Default indicator parameters

pub struct BollingerDefaults {
    pub period: usize,
    pub multiplier: f64,
}

pub struct KdjDefaults {
    pub period: usize,
    pub k_smooth: usize,
    pub d_smooth: usize,
}

pub struct SupertrendDefaults {
    pub atr_period: usize,
    pub factor: f64,
}

pub struct SupertrendAiDefaults {
    pub atr_period: usize,
    pub factor_min: f64,
    pub factor_max: f64,
    pub factor_step: f64,
    // Values > 1 are read as an EMA span, otherwise as the alpha itself
    pub perf_alpha: f64,
    pub clusters: usize,
    pub max_kmeans_iterations: usize,
    pub use_ama: bool,
    pub denom_span: f64,
}

/// The Master Indicator Configuration
pub struct IndicatorDefaults {
    pub bollinger: BollingerDefaults,
    pub kdj: KdjDefaults,
    pub supertrend: SupertrendDefaults,
    pub supertrend_ai: SupertrendAiDefaults,
}

pub const INDICATORS: IndicatorDefaults = IndicatorDefaults {
    bollinger: BollingerDefaults {
        period: 20,
        multiplier: 2.0,
    },
    kdj: KdjDefaults {
        period: 9,
        k_smooth: 3,
        d_smooth: 3,
    },
    supertrend: SupertrendDefaults {
        atr_period: 10,
        factor: 3.0,
    },
    supertrend_ai: SupertrendAiDefaults {
        atr_period: 14,
        factor_min: 1.5,
        factor_max: 4.0,
        factor_step: 0.5,
        perf_alpha: 10.0,
        clusters: 3,
        max_kmeans_iterations: 40,
        use_ama: false,
        denom_span: 10.0,
    },
};
