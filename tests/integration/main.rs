//! Integration tests: drive `PanelClient` and the workflow against an
//! in-process fake panel.

mod mock_panel;
