//! Purpose: Internal JSON parsing boundary shared by runtime callsites.
//! Exports: `parse` module with decode helpers used by the table loader and stdin attach.
//! Role: Single seam for parser details so callsites avoid ad hoc decode logic.
//! Invariants: Table documents are decoded through this module.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;
