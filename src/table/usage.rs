use std::collections::HashMap;

/// One filesystem row of the usage table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRow {
    pub source: String,
    pub size: u64,
    pub used: u64,
    pub available: u64,
    pub percent: String,
    pub target: String,
}

/// Usage rows indexed both by mount target and by bare device name.
#[derive(Debug, Default, Clone)]
pub struct UsageTable {
    by_mount: HashMap<String, UsageRow>,
    by_device: HashMap<String, UsageRow>,
}

impl UsageTable {
    /// Parse header-stripped `df -B1 --output=source,size,used,avail,pcent,target`.
    ///
    /// Later rows for the same key replace earlier ones.
    pub fn parse(text: &str) -> Self {
        let mut table = Self::default();

        for line in text.lines() {
            let Some(row) = parse_row(line) else {
                continue;
            };

            let device = row
                .source
                .strip_prefix("/dev/")
                .unwrap_or(&row.source)
                .to_string();
            table.by_device.insert(device, row.clone());
            table.by_mount.insert(row.target.clone(), row);
        }

        table
    }

    pub fn by_mount(&self, mountpoint: &str) -> Option<&UsageRow> {
        self.by_mount.get(mountpoint)
    }

    pub fn by_device(&self, device_name: &str) -> Option<&UsageRow> {
        self.by_device.get(device_name)
    }

    /// Mountpoint match first, then device name.
    pub fn lookup(&self, mountpoint: Option<&str>, device_name: &str) -> Option<&UsageRow> {
        mountpoint
            .filter(|m| !m.is_empty())
            .and_then(|m| self.by_mount(m))
            .or_else(|| self.by_device(device_name))
    }

    pub fn len(&self) -> usize {
        self.by_mount.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mount.is_empty()
    }
}

/// Five whitespace tokens, then the rest of the line as the target so that
/// mountpoints containing spaces survive.
fn parse_row(line: &str) -> Option<UsageRow> {
    let mut rest = line;
    let mut tokens = [""; 5];
    for slot in tokens.iter_mut() {
        let (token, tail) = next_token(rest);
        *slot = token;
        rest = tail;
    }

    let [source, size, used, available, percent] = tokens;
    let target = rest.trim();
    if source.is_empty() || target.is_empty() {
        return None;
    }

    Some(UsageRow {
        source: source.to_string(),
        size: size.parse().unwrap_or(0),
        used: used.parse().unwrap_or(0),
        available: available.parse().unwrap_or(0),
        percent: percent.to_string(),
        target: target.to_string(),
    })
}

fn next_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(end) => (&text[..end], &text[end..]),
        None => (text, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DF_OUTPUT: &str = "\
/dev/nvme0n1p2  502392610816 211283410944 265487667200  45% /
tmpfs            16624070656     24576000  16599494656   1% /dev/shm
/dev/nvme0n1p1     535805952     65138688    470667264  13% /boot/efi
/dev/sdb1      1000202039296 600121223577 400080815719  60% /media/user/My Passport
";

    #[test]
    fn test_parse_rows() {
        let table = UsageTable::parse(DF_OUTPUT);
        assert_eq!(table.len(), 4);

        let root = table.by_mount("/").unwrap();
        assert_eq!(root.source, "/dev/nvme0n1p2");
        assert_eq!(root.size, 502_392_610_816);
        assert_eq!(root.used, 211_283_410_944);
        assert_eq!(root.available, 265_487_667_200);
        assert_eq!(root.percent, "45%");
    }

    #[test]
    fn test_target_with_spaces() {
        let table = UsageTable::parse(DF_OUTPUT);
        let row = table.by_mount("/media/user/My Passport").unwrap();
        assert_eq!(row.percent, "60%");
        assert_eq!(table.by_device("sdb1").unwrap().target, "/media/user/My Passport");
    }

    #[test]
    fn test_device_key_strips_dev_prefix() {
        let table = UsageTable::parse(DF_OUTPUT);
        assert!(table.by_device("nvme0n1p1").is_some());
        assert!(table.by_device("/dev/nvme0n1p1").is_none());
        // Pseudo filesystems keep their source verbatim
        assert!(table.by_device("tmpfs").is_some());
    }

    #[test]
    fn test_rows_without_target_are_skipped() {
        let table = UsageTable::parse("/dev/sda1 100 50 50 50%\n\n   \n");
        assert!(table.is_empty());
    }

    #[test]
    fn test_lookup_prefers_mountpoint() {
        let text = "\
/dev/sda1 100 10 90 10% /data
/dev/sdb1 100 70 30 70% /backup
";
        let table = UsageTable::parse(text);

        // sdb1's row wins because its mountpoint matches, despite the name
        let row = table.lookup(Some("/backup"), "sda1").unwrap();
        assert_eq!(row.percent, "70%");

        let row = table.lookup(None, "sda1").unwrap();
        assert_eq!(row.percent, "10%");

        let row = table.lookup(Some("/elsewhere"), "sdb1").unwrap();
        assert_eq!(row.percent, "70%");

        assert!(table.lookup(Some(""), "sdc").is_none());
    }
}
