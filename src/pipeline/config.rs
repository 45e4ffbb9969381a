#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Run STEP2A and STEP2B concurrently. Results are still stored in order.
    pub parallel_detection: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parallel_detection: false,
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel_detection(mut self, parallel_detection: bool) -> Self {
        self.parallel_detection = parallel_detection;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}
