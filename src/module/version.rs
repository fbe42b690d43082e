//! 版本与版本范围
//!
//! 模块版本由 (major, minor, micro, qualifier) 四段组成，按字典序比较：
//! 前三段按数值比较，qualifier 按字符串比较。
//!
//! 版本范围支持以下写法：
//!
//! - 区间：`[1.0,2.0)`、`(1.0,2.0]`
//! - 单个版本：`1.2` 表示"至少 1.2"
//! - 空字符串或 `*`：任意版本
//! - semver 要求：`^1.2`、`~1.4`、`>=1, <3`（只比较前三段）
//!
//! # 示例
//!
//! ```rust
//! use bundle_classpath::module::version::{Version, VersionRange};
//!
//! let range: VersionRange = "[1.0,2.0)".parse().unwrap();
//! assert!(range.matches(&"1.5.0".parse::<Version>().unwrap()));
//! assert!(!range.matches(&"2.0.0".parse::<Version>().unwrap()));
//! ```

use std::fmt;
use std::str::FromStr;

use semver::VersionReq;
use serde::{Deserialize, Serialize};

use crate::utils::{CoreError, Result};

/// 模块版本
///
/// 字段顺序即比较顺序，`Ord` 由 derive 给出。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// 主版本号
    pub major: u32,
    /// 次版本号
    pub minor: u32,
    /// 修订号
    pub micro: u32,
    /// 限定符
    pub qualifier: String,
}

impl Version {
    /// 创建不带限定符的版本
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// 设置限定符
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = qualifier.into();
        self
    }

    /// 解析版本字符串
    ///
    /// 接受 `1`、`1.2`、`1.2.3`、`1.2.3.qualifier`，缺失的数字段补零。
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(CoreError::VersionParse("版本字符串为空".to_string()));
        }

        let mut parts = trimmed.splitn(4, '.');
        let mut numbers = [0u32; 3];
        for (index, slot) in numbers.iter_mut().enumerate() {
            match parts.next() {
                Some(part) => {
                    *slot = part.parse().map_err(|_| {
                        CoreError::VersionParse(format!(
                            "'{}' 的第 {} 段 '{}' 不是数字",
                            trimmed,
                            index + 1,
                            part
                        ))
                    })?;
                }
                None => break,
            }
        }

        let qualifier = parts.next().unwrap_or_default();
        if qualifier.is_empty() && trimmed.matches('.').count() >= 3 {
            return Err(CoreError::VersionParse(format!(
                "'{}' 的限定符为空",
                trimmed
            )));
        }
        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(CoreError::VersionParse(format!(
                "'{}' 的限定符 '{}' 包含非法字符",
                trimmed, qualifier
            )));
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier: qualifier.to_string(),
        })
    }

    /// 转换为 semver 版本（丢弃限定符）
    pub fn to_semver(&self) -> semver::Version {
        semver::Version::new(self.major as u64, self.minor as u64, self.micro as u64)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// 版本范围
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionRange {
    /// 任意版本
    #[default]
    Any,
    /// 不低于给定版本
    AtLeast(Version),
    /// 区间
    Interval {
        /// 下界
        min: Version,
        /// 是否包含下界
        min_inclusive: bool,
        /// 上界
        max: Version,
        /// 是否包含上界
        max_inclusive: bool,
    },
    /// semver 要求
    Semver(VersionReq),
}

impl VersionRange {
    /// 解析版本范围字符串
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(VersionRange::Any);
        }

        if trimmed.starts_with('[') || trimmed.starts_with('(') {
            return Self::parse_interval(trimmed);
        }

        let is_semver = trimmed.starts_with(['^', '~', '=', '<', '>', '*']) || trimmed.contains(',');
        if is_semver {
            let req = VersionReq::parse(trimmed).map_err(|e| CoreError::InvalidVersionRange {
                range: trimmed.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(VersionRange::Semver(req));
        }

        Version::parse(trimmed)
            .map(VersionRange::AtLeast)
            .map_err(|e| CoreError::InvalidVersionRange {
                range: trimmed.to_string(),
                reason: e.to_string(),
            })
    }

    /// 解析区间写法 `[min,max)`
    fn parse_interval(trimmed: &str) -> Result<Self> {
        let invalid = |reason: &str| CoreError::InvalidVersionRange {
            range: trimmed.to_string(),
            reason: reason.to_string(),
        };

        let min_inclusive = trimmed.starts_with('[');
        let max_inclusive = match trimmed.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(invalid("缺少右边界 ']' 或 ')'")),
        };

        let inner = &trimmed[1..trimmed.len() - 1];
        let (min, max) = inner
            .split_once(',')
            .ok_or_else(|| invalid("区间必须包含两个以逗号分隔的版本"))?;

        let min = Version::parse(min).map_err(|e| invalid(&e.to_string()))?;
        let max = Version::parse(max).map_err(|e| invalid(&e.to_string()))?;
        if min > max {
            return Err(invalid("下界大于上界"));
        }

        Ok(VersionRange::Interval {
            min,
            min_inclusive,
            max,
            max_inclusive,
        })
    }

    /// 检查版本是否落在范围内
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionRange::Any => true,
            VersionRange::AtLeast(min) => version >= min,
            VersionRange::Interval {
                min,
                min_inclusive,
                max,
                max_inclusive,
            } => {
                let above_min = if *min_inclusive { version >= min } else { version > min };
                let below_max = if *max_inclusive { version <= max } else { version < max };
                above_min && below_max
            }
            VersionRange::Semver(req) => req.matches(&version.to_semver()),
        }
    }

    /// 是否为任意版本
    pub fn is_any(&self) -> bool {
        matches!(self, VersionRange::Any)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::Any => write!(f, "*"),
            VersionRange::AtLeast(min) => write!(f, "{}", min),
            VersionRange::Interval {
                min,
                min_inclusive,
                max,
                max_inclusive,
            } => write!(
                f,
                "{}{},{}{}",
                if *min_inclusive { '[' } else { '(' },
                min,
                max,
                if *max_inclusive { ']' } else { ')' }
            ),
            VersionRange::Semver(req) => write!(f, "{}", req),
        }
    }
}

impl FromStr for VersionRange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionRange {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<VersionRange> for String {
    fn from(range: VersionRange) -> Self {
        range.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    // ==================== Version 测试 ====================

    #[test]
    fn test_parse_pads_missing_segments() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("3.4.5.v20100101"), Version::new(3, 4, 5).with_qualifier("v20100101"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("a.b").is_err());
        assert!(Version::parse("1.2.3.").is_err());
        assert!(Version::parse("1.2.3.q!").is_err());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        assert!(v("1.10.0") > v("1.9.9"));
        assert!(v("2.0.0") > v("1.99.99"));
        assert!(v("1.0.0.b") > v("1.0.0.a"));
        assert!(v("1.0.0.a") > v("1.0.0"));
        assert!(v("1.0.0.20100102") > v("1.0.0.20100101"));
    }

    #[test]
    fn test_display() {
        assert_eq!(v("1.2").to_string(), "1.2.0");
        assert_eq!(v("1.2.3.qual").to_string(), "1.2.3.qual");
    }

    // ==================== VersionRange 测试 ====================

    #[test]
    fn test_range_any() {
        let range = VersionRange::parse("").unwrap();
        assert!(range.is_any());
        assert!(range.matches(&v("0.0.1")));
        assert_eq!(VersionRange::parse("*").unwrap(), VersionRange::Any);
    }

    #[test]
    fn test_range_at_least() {
        let range = VersionRange::parse("1.2").unwrap();
        assert!(range.matches(&v("1.2.0")));
        assert!(range.matches(&v("7.0.0")));
        assert!(!range.matches(&v("1.1.9")));
    }

    #[test]
    fn test_range_interval_bounds() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.matches(&v("1.0.0")));
        assert!(range.matches(&v("1.9.9.zzz")));
        assert!(!range.matches(&v("2.0.0")));

        let range = VersionRange::parse("(1.0,2.0]").unwrap();
        assert!(!range.matches(&v("1.0.0")));
        assert!(range.matches(&v("2.0.0")));
    }

    #[test]
    fn test_range_interval_invalid() {
        assert!(VersionRange::parse("[1.0,2.0").is_err());
        assert!(VersionRange::parse("[2.0,1.0)").is_err());
        assert!(VersionRange::parse("[1.0)").is_err());
    }

    #[test]
    fn test_range_semver() {
        let range = VersionRange::parse("^1.2").unwrap();
        assert!(range.matches(&v("1.4.0")));
        assert!(range.matches(&v("1.2.0.qualifier")));
        assert!(!range.matches(&v("2.0.0")));

        let range = VersionRange::parse(">=1, <3").unwrap();
        assert!(range.matches(&v("2.5")));
        assert!(!range.matches(&v("3.0")));
    }

    #[test]
    fn test_range_display_parses_back() {
        for text in ["[1.0.0,2.0.0)", "(1.0.0,2.0.0]", "1.2.0", "*"] {
            let range = VersionRange::parse(text).unwrap();
            assert_eq!(range.to_string(), text);
        }
    }

    #[test]
    fn test_serde_string_form() {
        let version: Version = serde_yaml::from_str("\"1.2.3\"").unwrap();
        assert_eq!(version, Version::new(1, 2, 3));

        let range: VersionRange = serde_yaml::from_str("\"[1.0,2.0)\"").unwrap();
        assert!(range.matches(&version));
    }
}
