//! 数据源配置安全工具
//!
//! 提供加密配置项的解码，以及驱动选项键的合法性校验，
//! 防止配置文件中的明文凭据与非法选项键进入驱动层

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::DbPoolResult;
use crate::pool_error;

/// 加密存储值的前缀标记
const ENC_PREFIX: &str = "enc:";

/// 将明文选项值编码为存储形式
///
/// # 参数
/// * `plain` - 明文值
///
/// # 返回值
/// 携带 `enc:` 前缀的base64编码文本
pub fn encode_option(plain: &str) -> String {
    format!("{}{}", ENC_PREFIX, STANDARD.encode(plain.as_bytes()))
}

/// 解码一个加密存储的选项值
///
/// # 参数
/// * `stored` - 存储形式的值，必须携带 `enc:` 前缀
///
/// # 返回值
/// * `Ok(String)` - 解码后的明文
/// * `Err(DbPoolError)` - 前缀缺失或base64/UTF-8解码失败
pub fn decode_option(stored: &str) -> DbPoolResult<String> {
    let payload = stored.strip_prefix(ENC_PREFIX).ok_or_else(|| {
        pool_error!(config, "加密选项值缺少enc:前缀，无法解码")
    })?;

    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| pool_error!(config, format!("加密选项值base64解码失败: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| pool_error!(config, format!("加密选项值不是合法UTF-8: {}", e)))
}

/// 校验驱动选项键的合法性
///
/// 选项键只允许字母、数字、下划线、点与连字符，且不能为空
pub fn validate_option_key(key: &str) -> DbPoolResult<()> {
    if key.is_empty() {
        return Err(pool_error!(config, "驱动选项键不能为空"));
    }
    if key.len() > 64 {
        return Err(pool_error!(
            config,
            format!("驱动选项键长度不能超过64个字符: {}", key)
        ));
    }
    let legal = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');
    if !legal {
        return Err(pool_error!(
            config,
            format!("驱动选项键包含非法字符: {}", key)
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let stored = encode_option("s3cret-密码");
        assert!(stored.starts_with("enc:"));
        assert_eq!(decode_option(&stored).unwrap(), "s3cret-密码");
    }

    #[test]
    fn test_decode_rejects_plain_value() {
        assert!(decode_option("plaintext").is_err());
    }

    #[test]
    fn test_option_key_validation() {
        assert!(validate_option_key("connect_timeout").is_ok());
        assert!(validate_option_key("ssl.mode").is_ok());
        assert!(validate_option_key("").is_err());
        assert!(validate_option_key("bad key").is_err());
    }
}
