use serde::{Deserialize, Serialize};

/// One row of the uploaded voter/student roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub matric_no: String,
    pub firstname: Option<String>,
    pub middle_name: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department_name: Option<String>,
}

impl Student {
    /// "Last, First Middle" for sorted listings
    pub fn display_name(&self) -> String {
        let given = [&self.firstname, &self.middle_name]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        match self.lastname.as_deref().filter(|l| !l.is_empty()) {
            Some(last) if !given.is_empty() => format!("{}, {}", last, given),
            Some(last) => last.to_string(),
            None => given,
        }
    }
}
