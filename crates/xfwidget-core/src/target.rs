use std::net::Ipv4Addr;
use std::path::Path;

use thiserror::Error;

pub const SETTARGET_START_MARKER: &str = "# xfwidget: settarget function - Start";
pub const SETTARGET_END_MARKER: &str = "# xfwidget: settarget function - End";
pub const SETTARGET_SIGNATURE: &str = "function settarget()";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("usage: settarget <ipv4> <name>, or settarget with no arguments to clear")]
    Usage,
    #[error("invalid IP format: {0}")]
    InvalidFormat(String),
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub address: Ipv4Addr,
    pub name: String,
}

impl TargetSpec {
    pub fn parse(ip: &str, name: &str) -> Result<Self, TargetError> {
        if ip.is_empty() || name.trim().is_empty() {
            return Err(TargetError::Usage);
        }
        let address = validate_target_ip(ip)?;
        Ok(Self {
            address,
            name: name.to_string(),
        })
    }

    pub fn line(&self) -> String {
        format!("{} {}\n", self.address, self.name)
    }

    pub fn parse_line(raw: &str) -> Option<Self> {
        let (ip, name) = raw.trim().split_once(' ')?;
        Self::parse(ip, name.trim()).ok()
    }
}

pub fn validate_target_ip(ip: &str) -> Result<Ipv4Addr, TargetError> {
    let octets: Vec<&str> = ip.split('.').collect();
    let well_formed = octets.len() == 4
        && octets
            .iter()
            .all(|octet| (1..=3).contains(&octet.len()) && octet.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return Err(TargetError::InvalidFormat(ip.to_string()));
    }

    let mut parsed = [0_u8; 4];
    for (slot, octet) in parsed.iter_mut().zip(&octets) {
        if octet.len() > 1 && octet.starts_with('0') {
            return Err(TargetError::InvalidAddress(ip.to_string()));
        }
        *slot = octet
            .parse::<u8>()
            .map_err(|_| TargetError::InvalidAddress(ip.to_string()))?;
    }

    Ok(Ipv4Addr::from(parsed))
}

pub fn contains_settarget_block(content: &str) -> bool {
    content.contains(SETTARGET_START_MARKER) || content.contains(SETTARGET_SIGNATURE)
}

/// Removes the last exact occurrence of `block`. `None` when the text is no
/// longer present verbatim.
pub fn remove_appended_block(content: &str, block: &str) -> Option<String> {
    if block.is_empty() {
        return None;
    }
    let at = content.rfind(block)?;
    let mut out = String::with_capacity(content.len() - block.len());
    out.push_str(&content[..at]);
    out.push_str(&content[at + block.len()..]);
    Some(out)
}

pub fn render_settarget_block(target_file: &Path) -> String {
    let quoted = shell_double_quote(&target_file.display().to_string());
    SETTARGET_TEMPLATE
        .replace("@START@", SETTARGET_START_MARKER)
        .replace("@END@", SETTARGET_END_MARKER)
        .replace("@SIGNATURE@", SETTARGET_SIGNATURE)
        .replace("@TARGET_FILE@", &quoted)
}

fn shell_double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

const SETTARGET_TEMPLATE: &str = r#"
@START@
@SIGNATURE@ {
    local red='\033[0;31m'
    local green='\033[0;32m'
    local yellow='\033[1;33m'
    local cyan='\033[1;36m'
    local nc='\033[0m'
    local target_file=@TARGET_FILE@

    mkdir -p "$(dirname "$target_file")" 2>/dev/null

    if [ $# -eq 0 ]; then
        if [ -f "$target_file" ]; then
            rm -f "$target_file"
            echo -e "${cyan}[+]${nc} target cleared"
        else
            echo -e "${yellow}[!]${nc} no target to clear"
        fi
        return 0
    fi

    local ip_address="$1"
    local machine_name="$2"

    if [ -z "$ip_address" ] || [ -z "$machine_name" ]; then
        echo -e "${red}[x]${nc} usage: settarget <ipv4> <name>"
        echo -e "    settarget            (clear target)"
        return 1
    fi

    if ! echo "$ip_address" | grep -qE '^[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}$'; then
        echo -e "${red}[x]${nc} invalid IP format: $ip_address"
        return 1
    fi

    if ! echo "$ip_address" | awk -F'.' '{
        for (i = 1; i <= 4; i++) {
            if ($i < 0 || $i > 255) exit 1
            if (length($i) > 1 && substr($i, 1, 1) == "0") exit 1
        }
    }'; then
        echo -e "${red}[x]${nc} invalid IP address: $ip_address"
        return 1
    fi

    if ! echo "$ip_address $machine_name" > "$target_file"; then
        echo -e "${red}[x]${nc} could not write $target_file"
        return 1
    fi

    echo -e "${green}[+]${nc} target set: $ip_address ($machine_name)"
    return 0
}
@END@
"#;
