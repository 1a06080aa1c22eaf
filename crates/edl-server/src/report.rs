/// Markdown summary shown after a manual update.
pub fn update_table(values: &[&str]) -> String {
    let mut out = String::from("### EDL was updated successfully with the following values\n");
    out.push_str("|indicators|\n|---|\n");
    for value in values {
        out.push_str("| ");
        out.push_str(&value.replace('|', "\\|").replace('\n', " "));
        out.push_str(" |\n");
    }
    out
}
