//! 短 ID 生成
//!
//! 订阅和调度任务使用 10 位 62 进制字符串（0-9, a-z, A-Z）作为标识，
//! 便于在日志中关联同一次调度的多条记录。

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// 62 进制字符集
const BASE62_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// ID 长度
const ID_LENGTH: usize = 10;

/// 生成 10 位 62 进制 ID
///
/// 时间戳与随机数异或后编码。
///
/// # Example
///
/// ```
/// use bundle_classpath::utils::id::generate_id;
///
/// let id = generate_id();
/// assert_eq!(id.len(), 10);
/// ```
pub fn generate_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    let random: u64 = rand::thread_rng().gen();

    encode_base62(timestamp ^ random)
}

/// 生成带前缀的 ID，例如 `job-a1B2c3D4e5`
pub fn generate_prefixed_id(prefix: &str) -> String {
    format!("{}-{}", prefix, generate_id())
}

/// 把数值编码为定长 62 进制字符串
fn encode_base62(mut value: u64) -> String {
    let mut result = [0u8; ID_LENGTH];
    for slot in result.iter_mut().rev() {
        *slot = BASE62_CHARS[(value % 62) as usize];
        value /= 62;
    }
    result.iter().map(|&b| b as char).collect()
}

/// 验证 ID 格式是否有效
///
/// # Example
///
/// ```
/// use bundle_classpath::utils::id::is_valid_id;
///
/// assert!(is_valid_id("a1B2c3D4e5"));
/// assert!(!is_valid_id("too-short"));
/// ```
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id();
        assert!(is_valid_id(&id));
    }

    #[test]
    fn test_generate_id_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            assert!(ids.insert(generate_id()), "ID collision detected");
        }
    }

    #[test]
    fn test_encode_base62() {
        assert_eq!(encode_base62(0), "0000000000");
        assert_eq!(encode_base62(61), "000000000Z");
        assert_eq!(encode_base62(62), "0000000010");
    }

    #[test]
    fn test_prefixed_id() {
        let id = generate_prefixed_id("job");
        assert!(id.starts_with("job-"));
        assert!(is_valid_id(&id[4..]));
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("0000000000"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("a1B2c3D4e!"));
        assert!(!is_valid_id("toolongstring"));
    }
}
