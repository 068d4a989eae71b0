//! Framingham-10 and REGICOR risk functions.
//!
//! Both scores share the same linear predictor and only differ in the baseline
//! constants plugged into `1 - s^exp(l - g)`.

use crate::records::{PatientRecord, Sex};

pub const MIN_AGE: f64 = 30.0;
pub const MAX_AGE: f64 = 74.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CholesterolBand {
    Below160,
    From200To239,
    From240To279,
    From280,
    Reference,
}

impl CholesterolBand {
    pub fn of(coltot: f64) -> Self {
        if (50.0..160.0).contains(&coltot) {
            CholesterolBand::Below160
        } else if (200.0..=239.0).contains(&coltot) {
            CholesterolBand::From200To239
        } else if (240.0..=279.0).contains(&coltot) {
            CholesterolBand::From240To279
        } else if (280.0..777.0).contains(&coltot) {
            CholesterolBand::From280
        } else {
            CholesterolBand::Reference
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdlBand {
    Below35,
    From35To44,
    From45To49,
    From50To59,
    From60,
    Reference,
}

impl HdlBand {
    pub fn of(hdl: f64) -> Self {
        if hdl > 5.0 && hdl < 35.0 {
            HdlBand::Below35
        } else if (35.0..45.0).contains(&hdl) {
            HdlBand::From35To44
        } else if (45.0..50.0).contains(&hdl) {
            HdlBand::From45To49
        } else if (50.0..60.0).contains(&hdl) {
            HdlBand::From50To59
        } else if hdl >= 60.0 {
            HdlBand::From60
        } else {
            HdlBand::Reference
        }
    }
}

/// Blood pressure category, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BloodPressure {
    Unclassified,
    Optimal,
    Normal,
    HighNormal,
    Stage1,
    Stage2,
}

impl BloodPressure {
    /// Systolic and diastolic readings are classified independently; when they
    /// land in different categories the more severe one wins.
    pub fn of(presis: f64, presdi: f64) -> Self {
        let flags = [
            (BloodPressure::Optimal, presis < 120.0 || presdi < 80.0),
            (
                BloodPressure::Normal,
                (120.0..=129.0).contains(&presis) || (80.0..=84.0).contains(&presdi),
            ),
            (
                BloodPressure::HighNormal,
                (130.0..=139.0).contains(&presis) || (85.0..=89.0).contains(&presdi),
            ),
            (
                BloodPressure::Stage1,
                (140.0..=159.0).contains(&presis) || (90.0..=99.0).contains(&presdi),
            ),
            (BloodPressure::Stage2, presis >= 160.0 || presdi >= 100.0),
        ];

        flags
            .iter()
            .filter(|(_, set)| *set)
            .map(|(category, _)| *category)
            .max()
            .unwrap_or(BloodPressure::Unclassified)
    }
}

/// Weights of the Framingham linear predictor for one sex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub age: f64,
    pub age_squared: f64,
    pub chol_below_160: f64,
    pub chol_200_239: f64,
    pub chol_240_279: f64,
    pub chol_from_280: f64,
    pub hdl_below_35: f64,
    pub hdl_35_44: f64,
    pub hdl_45_49: f64,
    pub hdl_50_59: f64,
    pub hdl_from_60: f64,
    pub bp_optimal: f64,
    pub bp_normal: f64,
    pub bp_high_normal: f64,
    pub bp_stage1: f64,
    pub bp_stage2: f64,
    pub diabetes: f64,
    pub smoker: f64,
}

pub const MALE: Coefficients = Coefficients {
    age: 0.04826,
    age_squared: 0.0,
    chol_below_160: -0.65945,
    chol_200_239: 0.17692,
    chol_240_279: 0.50539,
    chol_from_280: 0.65713,
    hdl_below_35: 0.49744,
    hdl_35_44: 0.24310,
    hdl_45_49: 0.0,
    hdl_50_59: -0.05107,
    hdl_from_60: -0.48660,
    bp_optimal: -0.00226,
    bp_normal: 0.0,
    bp_high_normal: 0.28320,
    bp_stage1: 0.52168,
    bp_stage2: 0.61859,
    diabetes: 0.42839,
    smoker: 0.52337,
};

pub const FEMALE: Coefficients = Coefficients {
    age: 0.33766,
    age_squared: -0.00268,
    chol_below_160: -0.26138,
    chol_200_239: 0.20771,
    chol_240_279: 0.24385,
    chol_from_280: 0.53513,
    hdl_below_35: 0.84312,
    hdl_35_44: 0.37796,
    hdl_45_49: 0.19785,
    hdl_50_59: 0.0,
    hdl_from_60: -0.42951,
    bp_optimal: -0.53363,
    bp_normal: 0.0,
    bp_high_normal: -0.06773,
    bp_stage1: 0.26288,
    bp_stage2: 0.46573,
    diabetes: 0.59626,
    smoker: 0.29246,
};

/// Mean-predictor offset `g` and baseline survival `s` of one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub g: f64,
    pub s: f64,
}

pub const FRAMINGHAM_MALE: Baseline = Baseline { g: 3.0975, s: 0.90015 };
pub const FRAMINGHAM_FEMALE: Baseline = Baseline { g: 9.9245, s: 0.96246 };
pub const REGICOR_MALE: Baseline = Baseline { g: 3.489, s: 0.951 };
pub const REGICOR_FEMALE: Baseline = Baseline { g: 10.279, s: 0.978 };

impl Baseline {
    pub fn probability(&self, l_chol: f64) -> f64 {
        1.0 - self.s.powf((l_chol - self.g).exp())
    }
}

impl Coefficients {
    pub fn for_sex(sex: Sex) -> &'static Coefficients {
        match sex {
            Sex::Male => &MALE,
            Sex::Female => &FEMALE,
        }
    }

    fn cholesterol(&self, band: CholesterolBand) -> f64 {
        match band {
            CholesterolBand::Below160 => self.chol_below_160,
            CholesterolBand::From200To239 => self.chol_200_239,
            CholesterolBand::From240To279 => self.chol_240_279,
            CholesterolBand::From280 => self.chol_from_280,
            CholesterolBand::Reference => 0.0,
        }
    }

    fn hdl(&self, band: HdlBand) -> f64 {
        match band {
            HdlBand::Below35 => self.hdl_below_35,
            HdlBand::From35To44 => self.hdl_35_44,
            HdlBand::From45To49 => self.hdl_45_49,
            HdlBand::From50To59 => self.hdl_50_59,
            HdlBand::From60 => self.hdl_from_60,
            HdlBand::Reference => 0.0,
        }
    }

    fn blood_pressure(&self, category: BloodPressure) -> f64 {
        match category {
            BloodPressure::Optimal => self.bp_optimal,
            BloodPressure::Normal => self.bp_normal,
            BloodPressure::HighNormal => self.bp_high_normal,
            BloodPressure::Stage1 => self.bp_stage1,
            BloodPressure::Stage2 => self.bp_stage2,
            BloodPressure::Unclassified => 0.0,
        }
    }

    /// `l_chol` for a record scored with these weights.
    pub fn linear_predictor(&self, r: &PatientRecord) -> f64 {
        self.age * r.age
            + self.age_squared * (r.age * r.age)
            + self.cholesterol(CholesterolBand::of(r.coltot))
            + self.hdl(HdlBand::of(r.hdl))
            + self.blood_pressure(BloodPressure::of(r.presis, r.presdi))
            + self.diabetes * r.diabetes
            + self.smoker * r.smoker
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskScores {
    pub framingham: f64,
    pub regicor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Scored(RiskScores),
    /// Age outside the validated range of the model.
    Excluded,
}

/// Ages outside [30, 74] are not extrapolated.
pub fn in_age_range(age: f64) -> bool {
    (MIN_AGE..=MAX_AGE).contains(&age)
}

pub fn score(record: &PatientRecord) -> Score {
    if !in_age_range(record.age) {
        return Score::Excluded;
    }

    let l_chol = Coefficients::for_sex(record.sex).linear_predictor(record);
    let (framingham, regicor) = match record.sex {
        Sex::Male => (FRAMINGHAM_MALE, REGICOR_MALE),
        Sex::Female => (FRAMINGHAM_FEMALE, REGICOR_FEMALE),
    };

    Score::Scored(RiskScores {
        framingham: framingham.probability(l_chol),
        regicor: regicor.probability(l_chol),
    })
}
