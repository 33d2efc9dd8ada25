use tracing::debug;

/// Number of SSIDs a driver probes for in one scan unless it reports otherwise
pub const DEFAULT_MAX_SCAN_SSIDS: usize = 20;

/// Bounds the hidden-network list to what the driver can probe for.
///
/// Entries past the capacity are dropped silently; the front of the list wins.
#[derive(Debug, Clone, Copy)]
pub struct HiddenNetworkListBuilder {
    capacity: usize,
}

impl HiddenNetworkListBuilder {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn build(&self, identifiers: &[String]) -> Vec<String> {
        if identifiers.len() > self.capacity {
            debug!(
                "Hidden network list truncated from {} to {} entries",
                identifiers.len(),
                self.capacity
            );
        }
        identifiers.iter().take(self.capacity).cloned().collect()
    }
}

impl Default for HiddenNetworkListBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SCAN_SSIDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("test_ssid_{i}")).collect()
    }

    #[test]
    fn list_within_capacity_is_untouched() {
        let input = ssids(20);
        assert_eq!(HiddenNetworkListBuilder::new(20).build(&input), input);
    }

    #[test]
    fn oversized_list_keeps_the_front() {
        let input = ssids(20);
        for cap in [19, 7, 1] {
            let built = HiddenNetworkListBuilder::new(cap).build(&input);
            assert_eq!(built, input[..cap].to_vec());
        }
    }

    #[test]
    fn empty_list_stays_empty() {
        assert!(HiddenNetworkListBuilder::default().build(&[]).is_empty());
    }

    #[test]
    fn duplicates_are_passed_through() {
        let input = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(HiddenNetworkListBuilder::new(2).build(&input), vec!["a", "a"]);
    }
}
