//! Host metric sampling via sysinfo.

use sysinfo::System;

/// Samples memory and CPU utilisation of the local host.
///
/// Keeps one `System` alive across samples so CPU usage deltas are computed
/// against the previous refresh.
pub struct HostSampler {
    system: System,
}

impl HostSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// System memory utilisation in percent.
    pub fn memory_percent(&mut self) -> f64 {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        if total == 0 {
            return 0.0;
        }

        self.system.used_memory() as f64 / total as f64 * 100.0
    }

    /// Average CPU utilisation in percent across all cores.
    ///
    /// Needs two refreshes separated by the minimum update interval to get a
    /// meaningful usage delta.
    pub async fn cpu_percent(&mut self) -> f64 {
        self.system.refresh_cpu_usage();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        self.system.refresh_cpu_usage();

        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return 0.0;
        }

        let usage_sum = cpus.iter().map(|cpu| cpu.cpu_usage() as f64).sum::<f64>();
        usage_sum / cpus.len() as f64
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_percent_in_range() {
        let mut sampler = HostSampler::new();
        let percent = sampler.memory_percent();
        assert!((0.0..=100.0).contains(&percent), "got {percent}");
    }

    #[tokio::test]
    async fn test_cpu_percent_in_range() {
        let mut sampler = HostSampler::new();
        let percent = sampler.cpu_percent().await;
        assert!((0.0..=100.0).contains(&percent), "got {percent}");
    }
}
