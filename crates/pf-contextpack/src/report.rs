//! A machine-readable record of what went into an assembled prompt,
//! useful for debugging why a model saw (or didn't see) something.

#[derive(Debug, Clone)]
pub struct SectionReport {
    pub name: String,
    pub raw_chars: usize,
    pub injected_chars: usize,
    pub truncated_per_section: bool,
    pub truncated_total_cap: bool,
    pub included: bool,
}

#[derive(Debug, Clone)]
pub struct ContextReport {
    pub sections: Vec<SectionReport>,
    pub total_injected_chars: usize,
}
