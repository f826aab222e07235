use rand::Rng;

/// Source of candidate user ids.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Decimal ids drawn uniformly from `[0, space)`.
#[derive(Debug, Clone, Copy)]
pub struct RandomIds {
    space: u32,
}

impl RandomIds {
    pub fn new(space: u32) -> Self {
        Self { space: space.max(1) }
    }
}

impl IdSource for RandomIds {
    fn next_id(&self) -> String {
        rand::rng().random_range(0..self.space).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_stay_within_space() {
        let ids = RandomIds::new(10);
        for _ in 0..200 {
            let id: u32 = ids.next_id().parse().unwrap();
            assert!(id < 10);
        }
        assert_eq!(RandomIds::new(0).next_id(), "0");
    }
}
