use chrono::{DateTime, Utc};

/// 書き込み経路に注入する時刻源。テストでは固定時刻に差し替える
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// ドキュメントIDと共有用短縮IDの生成器
pub trait IdGenerator: Send + Sync {
    /// ドキュメントID（UUID v4）
    fn document_id(&self) -> String;
    /// 共有リンク用の英数字短縮ID
    fn short_id(&self, len: usize) -> String;
}

pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn document_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn short_id(&self, len: usize) -> String {
        use rand::{Rng, distr::Alphanumeric};

        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_id_has_requested_length_and_charset() {
        let ids = RandomIdGenerator;
        let id = ids.short_id(10);
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn short_ids_are_not_repeated() {
        let ids = RandomIdGenerator;
        let a = ids.short_id(10);
        let b = ids.short_id(10);
        assert_ne!(a, b);
    }
}
