use tracing::info;

use crate::config::ThermostatConfig;

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThermostatDecision {
    pub valid: bool,
    pub output: bool,
    pub transition: Option<OutputTransition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTransition {
    pub from: bool,
    pub to: bool,
    pub temp_ok: bool,
    pub humidity_ok: bool,
}

/// Heater thermostat driven by both temperature and relative humidity.
///
/// Heat is requested when it is too cold or too humid. Both checks use a
/// band centred on the configured limit; which edge of the band applies
/// depends on whether the heater is currently on, so the output cannot chatter
/// while a reading hovers around a limit.
#[derive(Debug, Clone)]
pub struct Thermostat {
    config: ThermostatConfig,
    valid: bool,
    output: bool,
}

impl Thermostat {
    pub fn new(mut config: ThermostatConfig) -> Self {
        config.sanitize();
        Self {
            config,
            valid: false,
            output: false,
        }
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    pub fn set_temp_hysteresis(&mut self, hysteresis_c: f32) {
        self.config.temp_hysteresis_c = hysteresis_c;
        self.config.sanitize();
    }

    pub fn set_humidity_hysteresis(&mut self, hysteresis: f32) {
        self.config.humidity_hysteresis = hysteresis;
        self.config.sanitize();
    }

    /// Feeds the latest readings and recomputes the output.
    ///
    /// Without both readings no decision is made and the previous output is
    /// held; missing data is not a reason to stop heating.
    pub fn evaluate(
        &mut self,
        temperature: Option<f32>,
        humidity: Option<f32>,
    ) -> ThermostatDecision {
        let (Some(temperature), Some(humidity)) = (temperature, humidity) else {
            self.valid = false;
            return self.decision(None);
        };
        self.valid = true;

        let temp_half = self.config.temp_hysteresis_c / 2.0;
        let humidity_half = self.config.humidity_hysteresis / 2.0;

        let (temp_ok, humidity_ok) = if self.output {
            (
                temperature > self.config.min_temp_c + temp_half,
                humidity < self.config.max_humidity - humidity_half,
            )
        } else {
            (
                temperature > self.config.min_temp_c - temp_half,
                humidity < self.config.max_humidity + humidity_half,
            )
        };

        let output = !temp_ok || !humidity_ok;
        if output == self.output {
            return self.decision(None);
        }

        let transition = OutputTransition {
            from: self.output,
            to: output,
            temp_ok,
            humidity_ok,
        };
        info!(
            "heater change from {} to {} temperature OK: {} humidity OK: {}",
            transition.from, transition.to, temp_ok, humidity_ok
        );
        self.output = output;
        self.decision(Some(transition))
    }

    fn decision(&self, transition: Option<OutputTransition>) -> ThermostatDecision {
        ThermostatDecision {
            valid: self.valid,
            output: self.output,
            transition,
        }
    }

    /// Whether [`Thermostat::output`] is backed by a complete reading and
    /// should be forwarded to the relay.
    pub fn output_active(&self) -> bool {
        self.valid
    }

    pub fn output(&self) -> bool {
        self.output
    }
}
