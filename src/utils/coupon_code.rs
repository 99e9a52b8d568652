//! 序列号 <-> 券码 编解码
//!
//! 券码格式按版本区分，新格式只能新增变体，不能修改已发布格式的输出，
//! 否则会与历史券码冲突。

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CouponCodeFormat {
    /// `CP-` + 至少 6 位补零的序列号，例如 31001 -> `CP-031001`
    #[default]
    V1,
}

const V1_PREFIX: &str = "CP-";
const V1_MIN_DIGITS: usize = 6;

impl CouponCodeFormat {
    pub fn encode(&self, serial_number: i64) -> AppResult<String> {
        if serial_number <= 0 {
            return Err(AppError::ValidationError(format!(
                "Serial number must be positive, got {serial_number}"
            )));
        }
        match self {
            CouponCodeFormat::V1 => Ok(format!(
                "{V1_PREFIX}{serial_number:0width$}",
                width = V1_MIN_DIGITS
            )),
        }
    }

    /// 只接受规范形式：解码后重新编码必须与输入一致
    #[cfg(test)]
    pub fn decode(&self, code: &str) -> Option<i64> {
        match self {
            CouponCodeFormat::V1 => {
                let digits = code.strip_prefix(V1_PREFIX)?;
                if digits.len() < V1_MIN_DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let serial = digits.parse::<i64>().ok()?;
                match self.encode(serial) {
                    Ok(canonical) if canonical == code => Some(serial),
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pads_to_six_digits() {
        let codec = CouponCodeFormat::V1;
        assert_eq!(codec.encode(31001).unwrap(), "CP-031001");
        assert_eq!(codec.encode(30001).unwrap(), "CP-030001");
        assert_eq!(codec.encode(7).unwrap(), "CP-000007");
    }

    #[test]
    fn test_encode_grows_past_six_digits() {
        let codec = CouponCodeFormat::V1;
        assert_eq!(codec.encode(1_234_567).unwrap(), "CP-1234567");
    }

    #[test]
    fn test_encode_rejects_non_positive() {
        let codec = CouponCodeFormat::V1;
        assert!(codec.encode(0).is_err());
        assert!(codec.encode(-5).is_err());
    }

    #[test]
    fn test_decode_canonical_only() {
        let codec = CouponCodeFormat::V1;
        assert_eq!(codec.decode("CP-031001"), Some(31001));
        assert_eq!(codec.decode("CP-1234567"), Some(1_234_567));
        // 多余的前导零不是规范形式
        assert_eq!(codec.decode("CP-0031001"), None);
        assert_eq!(codec.decode("CP-31001"), None);
        assert_eq!(codec.decode("XX-031001"), None);
        assert_eq!(codec.decode("CP-03100a"), None);
        assert_eq!(codec.decode("CP-000000"), None);
    }

    #[test]
    fn test_distinct_serials_give_distinct_codes() {
        let codec = CouponCodeFormat::V1;
        let codes: std::collections::HashSet<String> = (999_990..=1_000_010)
            .map(|s| codec.encode(s).unwrap())
            .collect();
        assert_eq!(codes.len(), 21);
    }
}
