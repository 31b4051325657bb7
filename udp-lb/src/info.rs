/// Column aligned text table for listings.
pub struct InfoTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl InfoTable {
    pub fn new(header: Vec<&str>) -> Self {
        Self {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: vec![],
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn render(&self, title: &str) -> String {
        let mut sizes = self.header.iter().map(|s| s.len()).collect::<Vec<_>>();
        for row in &self.rows {
            for (i, s) in row.iter().enumerate().take(sizes.len()) {
                sizes[i] = sizes[i].max(s.len());
            }
        }

        let format_row = |row: &Vec<String>| {
            sizes
                .iter()
                .enumerate()
                .map(|(i, &size)| {
                    format!("{0:<1$}", row.get(i).map_or("", |s| s.as_str()), size + 1)
                })
                .collect::<String>()
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        if !title.is_empty() {
            out.push_str(&format!("\r\n{title}\r\n{0:-<1$}\r\n", "-", title.len()));
        }
        let hdr = format_row(&self.header);
        let hdr_len = hdr.len();
        out.push_str(&hdr);
        out.push_str("\r\n");
        out.push_str(&format!("{0:-<1$}\r\n", "-", hdr_len));
        for row in &self.rows {
            out.push_str(&format_row(row));
            out.push_str("\r\n");
        }
        if !self.rows.is_empty() {
            out.push_str(&format!("{0:-<1$}\r\n", "-", hdr_len));
        }
        out
    }

    pub fn print(&self, title: &str) {
        print!("{}", self.render(title));
    }
}
