mod common;

use common::*;
use resinfo::{types::*, *};

fn minimal_dialog() -> DialogTemplate {
    DialogTemplate {
        style: WS_POPUP | DS_MODALFRAME,
        x: 1,
        y: 2,
        cx: 100,
        cy: 50,
        title: "A".into(),
        ..Default::default()
    }
}

fn button(id: u32, text: &str) -> DialogItem {
    DialogItem {
        style: WS_CHILD | WS_VISIBLE | WS_TABSTOP,
        x: 10,
        y: 20,
        cx: 50,
        cy: 14,
        id,
        class: ResourceId::Numeric(CONTROL_BUTTON),
        title: ResourceId::Named(text.into()),
        ..Default::default()
    }
}

#[test]
fn dialog_layout() {
    init_logger();

    #[rustfmt::skip]
    let bytes = [
        0x80, 0x00, 0x00, 0x80, // style
        0x00, 0x00, 0x00, 0x00, // extended style
        0x00, 0x00,             // items
        0x01, 0x00, 0x02, 0x00, 0x64, 0x00, 0x32, 0x00,
        0x00, 0x00,             // menu
        0x00, 0x00,             // class
        b'A', 0x00, 0x00, 0x00, // title
    ];
    let dialog = DialogTemplate::decode(&bytes).unwrap();
    assert_eq!(dialog, minimal_dialog());
    assert_eq!(dialog.encode().unwrap(), bytes);
}

#[test]
fn dialog_items_are_aligned() {
    init_logger();

    let mut dialog = minimal_dialog();
    dialog.items.push(DialogItem {
        style: WS_CHILD | WS_VISIBLE,
        ..button(1, "OK")
    });
    let data = dialog.encode().unwrap();
    assert_eq!(data.len(), 58);
    assert_eq!(&data[26..28], &[0, 0], "padding before the first item");
    assert_eq!(&data[28..32], &(WS_CHILD | WS_VISIBLE).to_le_bytes());
    assert_eq!(&data[46..50], &[0xFF, 0xFF, CONTROL_BUTTON as u8, 0x00], "class atom");

    let decoded = DialogTemplate::decode(&data).unwrap();
    assert_eq!(decoded, dialog);
    assert_eq!(decoded.item(1).unwrap().title, ResourceId::from("OK"));
}

#[test]
fn extended_dialog() {
    init_logger();

    let dialog = DialogTemplate {
        extended: true,
        help_id: 7,
        style: WS_POPUP | WS_CAPTION | WS_SYSMENU | DS_SETFONT,
        extended_style: 0x100,
        x: 0,
        y: 0,
        cx: 200,
        cy: 120,
        menu: Some(ResourceId::Numeric(100)),
        class: Some(ResourceId::Named("SettingsWindow".into())),
        title: "Settings".into(),
        font: Some(DialogFont {
            point_size: 9,
            weight: 400,
            italic: true,
            charset: 1,
            typeface: "Segoe UI".into(),
        }),
        items: vec![
            DialogItem {
                help_id: 3,
                creation_data: vec![1, 2, 3],
                ..button(0x0001_0001, "Apply")
            },
            DialogItem {
                class: ResourceId::Named("SysListView32".into()),
                title: ResourceId::Numeric(5),
                ..button(2, "")
            },
            button(3, "Cancel"),
        ],
    };
    let data = dialog.encode().unwrap();
    assert_eq!(&data[..4], &[0x01, 0x00, 0xFF, 0xFF], "extended signature");

    let mut decoded = DialogTemplate::decode(&data).unwrap();
    assert_eq!(decoded, dialog);

    decoded.item_mut(3).unwrap().title = ResourceId::from("Close");
    let decoded = DialogTemplate::decode(&decoded.encode().unwrap()).unwrap();
    assert_eq!(decoded.item(3).unwrap().title, ResourceId::from("Close"));
    assert_eq!(decoded.item(0x0001_0001).unwrap().creation_data, vec![1, 2, 3]);
}

#[test]
fn malformed_dialogs() {
    init_logger();

    let error = DialogTemplate::decode(&[1, 0, 0xFF]).unwrap_err();
    assert!(matches!(error, ResourceError::MalformedResource(_)));

    let mut dialog = minimal_dialog();
    dialog.items.push(button(1, "OK"));
    let mut data = dialog.encode().unwrap();
    data[8] = 2;
    assert!(
        matches!(DialogTemplate::decode(&data), Err(ResourceError::MalformedResource(_))),
        "declared item count exceeds data"
    );

    let data = minimal_dialog().encode().unwrap();
    assert!(
        matches!(DialogTemplate::decode(&data[..24]), Err(ResourceError::MalformedResource(_))),
        "unterminated title"
    );

    let error = CodecRegistry::known_types()
        .create_resource(ResourceIdPair::new(RT_DIALOG, 1, 0x0409), vec![0; 3])
        .unwrap_err();
    assert!(matches!(error.innermost(), ResourceError::MalformedResource(_)));
    assert_eq!(error.resource_id(), Some(&ResourceIdPair::new(RT_DIALOG, 1, 0x0409)));
}

#[test]
fn dialog_encoding_invariants() {
    init_logger();

    let invalid = |dialog: DialogTemplate| {
        matches!(dialog.encode(), Err(ResourceError::EncodingInvariantViolation(_)))
    };

    assert!(invalid(DialogTemplate {
        style: DS_SETFONT,
        ..minimal_dialog()
    }));
    assert!(invalid(DialogTemplate {
        font: Some(DialogFont::default()),
        ..minimal_dialog()
    }));
    assert!(invalid(DialogTemplate {
        help_id: 1,
        ..minimal_dialog()
    }));
    assert!(invalid(DialogTemplate {
        style: DS_SETFONT,
        font: Some(DialogFont {
            weight: 700,
            ..Default::default()
        }),
        ..minimal_dialog()
    }));
    assert!(invalid(DialogTemplate {
        items: vec![button(0x10000, "OK")],
        ..minimal_dialog()
    }));
    assert!(invalid(DialogTemplate {
        title: "A\0B".into(),
        ..minimal_dialog()
    }));
    assert!(!invalid(DialogTemplate {
        extended: true,
        items: vec![button(0x10000, "OK")],
        ..minimal_dialog()
    }));
}

#[test]
fn string_table() {
    init_logger();

    let mut table = StringTable::new();
    assert!(table.is_empty());
    table.set(0, "Hello").unwrap();
    table.set(15, "Wörld").unwrap();
    assert!(matches!(table.set(16, "x"), Err(ResourceError::EncodingInvariantViolation(_))));

    let data = table.encode().unwrap();
    assert_eq!(data.len(), 14 * 2 + 2 * (2 + 10));
    let decoded = StringTable::decode(&data).unwrap();
    assert_eq!(decoded, table);
    assert_eq!(decoded.get(15), Some("Wörld"));
    assert_eq!(decoded.get(1), Some(""));
    assert_eq!(decoded.get(16), None);

    assert_eq!(StringTable::block_name(17), ResourceId::Numeric(2));
    assert_eq!(StringTable::string_id(&ResourceId::Numeric(2), 1), Some(17));
    assert_eq!(StringTable::string_id(&ResourceId::Numeric(0), 1), None);
    assert_eq!(StringTable::string_id(&ResourceId::from("NAME"), 1), None);

    let decoded = StringTable::decode(&[2, 0, b'H', 0, b'i', 0]).unwrap();
    assert_eq!(decoded.get(0), Some("Hi"), "omitted trailing strings are empty");
    assert!(decoded.strings()[1..].iter().all(String::is_empty));

    assert!(matches!(
        StringTable::decode(&[5, 0, b'H', 0]),
        Err(ResourceError::MalformedResource(_))
    ));
}

#[test]
fn menu() {
    init_logger();

    let menu = Menu {
        items: vec![
            MenuItem::popup(
                "&File",
                vec![
                    MenuItem::command(1, "&Open"),
                    MenuItem::separator(),
                    MenuItem {
                        flags: MF_GRAYED as u32,
                        ..MenuItem::command(2, "E&xit")
                    },
                ],
            ),
            MenuItem::command(3, "&Help"),
        ],
        ..Default::default()
    };
    let data = menu.encode().unwrap();
    assert_eq!(&data[..4], &[0, 0, 0, 0], "standard header");
    assert_eq!(&data[4..6], &MF_POPUP.to_le_bytes());

    let decoded = Menu::decode(&data).unwrap();
    assert_eq!(decoded, menu);
    assert_eq!(decoded.find(2).map(|item| item.text.as_str()), Some("E&xit"));
    assert_eq!(decoded.find(4), None);

    assert!(matches!(
        Menu::decode(&data[..data.len() - 2]),
        Err(ResourceError::MalformedResource(_))
    ));
    assert!(matches!(
        Menu {
            help_id: 1,
            ..menu.clone()
        }
        .encode(),
        Err(ResourceError::EncodingInvariantViolation(_))
    ));
    assert!(matches!(
        Menu {
            items: vec![MenuItem::popup("Empty", Vec::new())],
            ..Default::default()
        }
        .encode(),
        Err(ResourceError::EncodingInvariantViolation(_))
    ));
    assert!(matches!(
        Menu::decode(&[2, 0, 0, 0]),
        Err(ResourceError::MalformedResource(_))
    ));

    // standard popups have no identifier field
    let mut popup_with_id = menu.clone();
    popup_with_id.items[0].id = 42;
    assert!(matches!(
        popup_with_id.encode(),
        Err(ResourceError::EncodingInvariantViolation(_))
    ));
    popup_with_id.extended = true;
    assert_eq!(Menu::decode(&popup_with_id.encode().unwrap()).unwrap(), popup_with_id);
}

#[test]
fn extended_menu() {
    init_logger();

    let menu = Menu {
        extended: true,
        help_id: 9,
        items: vec![
            MenuItem {
                help_id: 5,
                ..MenuItem::popup("&View", vec![MenuItem::command(0x0002_0000, "&Zoom")])
            },
            MenuItem {
                state: 0x8,
                ..MenuItem::command(3, "&Status Bar")
            },
        ],
    };
    let data = menu.encode().unwrap();
    assert_eq!(&data[..4], &[1, 0, 4, 0], "extended header");

    let decoded = Menu::decode(&data).unwrap();
    assert_eq!(decoded, menu);
    assert_eq!(decoded.find(0x0002_0000).map(|item| item.text.as_str()), Some("&Zoom"));

    assert!(matches!(
        Menu {
            extended: false,
            help_id: 0,
            ..menu
        }
        .encode(),
        Err(ResourceError::EncodingInvariantViolation(_))
    ));
}

#[test]
fn manifest() {
    init_logger();

    let text = "<?xml version=\"1.0\"?><assembly/>";
    let mut data = vec![0xEF, 0xBB, 0xBF];
    data.extend_from_slice(text.as_bytes());

    let manifest = Manifest::decode(&data).unwrap();
    assert!(manifest.bom);
    assert_eq!(manifest.text, text);
    assert_eq!(manifest.encode().unwrap(), data);

    let manifest = Manifest::decode(text.as_bytes()).unwrap();
    assert_eq!(manifest, Manifest::new(text));

    assert!(matches!(
        Manifest::decode(&[0x3C, 0xFF, 0xFE]),
        Err(ResourceError::MalformedResource(_))
    ));
}

#[test]
fn version_info() {
    init_logger();

    let english = Translation::new(0x0409, 0x04B0);
    let mut version = VersionInfo::new();
    if let Some(fixed) = version.fixed.as_mut() {
        fixed.file_version = VersionU32 {
            major: 0x0001_0002,
            minor: 0x0003_0004,
        };
    }
    version.set_string(english, VS_PRODUCT_NAME, "Product");
    version.set_string(english, VS_FILE_VERSION, "1.2.3.4");
    version.set_string(english, VS_COMMENTS, "");
    version.set_string(Translation::new(0x0407, 0x04B0), VS_PRODUCT_NAME, "Produkt");
    assert_eq!(version.translations.len(), 2);
    assert_eq!(english.key(), "040904B0");
    assert_eq!(Translation::parse_key("040904B0"), Some(english));
    assert_eq!(Translation::parse_key("0409"), None);

    let data = version.encode().unwrap();
    assert_eq!(u16::from_le_bytes([data[0], data[1]]) as usize, data.len(), "root length");
    assert_eq!(u16::from_le_bytes([data[2], data[3]]), 52, "fixed file info length");

    let decoded = VersionInfo::decode(&data).unwrap();
    assert_eq!(decoded, version);
    assert_eq!(decoded.string(VS_PRODUCT_NAME), Some("Product"));
    assert_eq!(decoded.strings["040704B0"][VS_PRODUCT_NAME], "Produkt");
    assert_eq!(decoded.string(VS_COMMENTS), Some(""));

    let mut invalid = data.clone();
    invalid[6] = b'X';
    assert!(matches!(VersionInfo::decode(&invalid), Err(ResourceError::MalformedResource(_))));
    assert!(matches!(
        VersionInfo::decode(&data[..30]),
        Err(ResourceError::MalformedResource(_))
    ));

    version.set_string(english, VS_COMPANY_NAME, "A\0B");
    assert!(matches!(version.encode(), Err(ResourceError::EncodingInvariantViolation(_))));
}

#[test]
fn version_info_keeps_unknown_blocks() {
    init_logger();

    let english = Translation::new(0x0409, 0x04B0);
    let mut version = VersionInfo::new();
    version.set_string(english, VS_PRODUCT_NAME, "Product");
    version.vars.push(VersionBlock::binary("Checksum", vec![1, 2, 3, 4]));
    let mut custom = VersionBlock::text("CustomFileInfo", "");
    custom.children.push(VersionBlock::text("Build", "nightly"));
    version.extra.push(custom);

    let data = version.encode().unwrap();
    let decoded = VersionInfo::decode(&data).unwrap();
    assert_eq!(decoded.translations, vec![english]);
    assert_eq!(decoded.vars, version.vars, "variables other than translations are kept");
    assert_eq!(decoded.extra, version.extra, "unknown root blocks are kept");
    assert_eq!(decoded.extra[0].children[0].text_value(), "nightly");
    assert_eq!(decoded.encode().unwrap(), data, "re-encoding writes every block back");

    let only_vars = VersionInfo {
        vars: version.vars.clone(),
        ..VersionInfo::new()
    };
    let decoded = VersionInfo::decode(&only_vars.encode().unwrap()).unwrap();
    assert!(decoded.translations.is_empty());
    assert_eq!(decoded, only_vars);
}

#[test]
fn icon_group() {
    init_logger();

    let group = IconGroup {
        entries: vec![
            IconDirectoryEntry {
                width: 16,
                height: 16,
                planes: 1,
                bit_count: 32,
                bytes: 0x468,
                id: 1,
                ..Default::default()
            },
            IconDirectoryEntry {
                width: 0,
                height: 0,
                planes: 1,
                bit_count: 32,
                bytes: 0x10828,
                id: 2,
                ..Default::default()
            },
        ],
    };
    let data = group.encode().unwrap();
    assert_eq!(data.len(), 6 + 2 * 14);
    assert_eq!(IconGroup::decode(&data).unwrap(), group);
    assert_eq!(group.icon_ids().collect::<Vec<_>>(), vec![1, 2]);

    assert!(matches!(IconGroup::decode(&data[..20]), Err(ResourceError::MalformedResource(_))));
    let mut cursor = data.clone();
    cursor[2] = 2;
    assert!(matches!(IconGroup::decode(&cursor), Err(ResourceError::MalformedResource(_))));
}

#[derive(Debug, Clone, PartialEq)]
struct Counter(u32);
impl ResourceFormat for Counter {
    fn decode(data: &[u8]) -> Result<Self, ResourceError> {
        let bytes = <[u8; 4]>::try_from(data)
            .map_err(|_| ResourceError::MalformedResource(ReadError(format!("{} bytes", data.len()))))?;
        Ok(Counter(u32::from_le_bytes(bytes)))
    }

    fn encode(&self) -> Result<Vec<u8>, ResourceError> { Ok(self.0.to_le_bytes().to_vec()) }
}

#[test]
fn codec_registry() {
    init_logger();

    let mut registry = CodecRegistry::new();
    registry.register_format::<Counter>("COUNTER").unwrap();
    assert!(matches!(
        registry.register_format::<Counter>("COUNTER"),
        Err(ResourceError::DuplicateType(_))
    ));
    registry
        .register(
            RT_RCDATA,
            codec_fn(|_id, data| {
                let model: Box<dyn ResourceModel> = Box::new(Counter(data.len() as u32));
                Ok(model)
            }),
        )
        .unwrap();

    let resource = registry
        .create_resource(ResourceIdPair::new("COUNTER", 1, 0), 7u32.to_le_bytes().to_vec())
        .unwrap();
    assert_eq!(resource.model::<Counter>(), Some(&Counter(7)));
    assert_eq!(resource.physical_len(), 4);
    assert_eq!(resource.encode().unwrap(), 7u32.to_le_bytes());

    let resource = registry.create_resource(ResourceIdPair::new(RT_RCDATA, 1, 0), vec![0; 9]).unwrap();
    assert_eq!(resource.model::<Counter>(), Some(&Counter(9)));
    assert!(resource.model::<Manifest>().is_none());

    let resource = registry.create_resource(ResourceIdPair::new(RT_BITMAP, 1, 0), vec![1, 2]).unwrap();
    assert!(!resource.is_specialized(), "unregistered types stay generic");
    assert_eq!(resource.data(), Some(&[1u8, 2][..]));

    let error = registry.create_resource(ResourceIdPair::new("COUNTER", 2, 0), vec![1]).unwrap_err();
    assert!(matches!(error, ResourceError::InResource { .. }));
    assert!(matches!(error.innermost(), ResourceError::MalformedResource(_)));

    assert!(registry.set_format::<Manifest>(RT_RCDATA).is_some(), "set replaces the codec");
    assert!(registry.unregister(&"COUNTER".into()).is_some());
    assert!(registry.resolve(&"COUNTER".into()).is_none());
    assert_eq!(registry.types().collect::<Vec<_>>(), vec![&ResourceId::from(RT_RCDATA)]);
}

#[test]
fn resource_payloads() {
    init_logger();

    let id = ResourceIdPair::new(RT_MANIFEST, 1, 0x0409);
    let mut resource = Resource::new(id.clone(), Manifest::new("<a/>"));
    assert!(resource.is_specialized());
    assert_eq!(resource.physical_len(), 0);
    assert_eq!(resource.data(), None);
    assert_eq!(resource.encoded_len().unwrap(), 4);

    resource.model_mut::<Manifest>().unwrap().text = "<assembly/>".into();
    assert_eq!(resource.encode().unwrap(), b"<assembly/>");
    assert!(resource.model_any().unwrap().is::<Manifest>());

    let cloned = resource.clone();
    resource.set_data(vec![1, 2, 3]);
    assert!(!resource.is_specialized());
    assert_eq!(resource.encode().unwrap(), vec![1, 2, 3]);
    assert_eq!(cloned.model::<Manifest>().map(|m| m.text.as_str()), Some("<assembly/>"));

    resource.set_model(Manifest::new("<b/>"));
    assert_eq!(resource.model::<Manifest>(), Some(&Manifest::new("<b/>")));
    assert_eq!(resource.id(), &id);
}
