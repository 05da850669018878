//! Windows API and binary constants.

#![allow(non_upper_case_globals)]

pub type DWORD = u32;
pub type WORD = u16;
pub type LANGID = WORD;


// https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-lcid/a9eac961-e77d-41a6-90a5-ce1a8b0cdb9c
pub const LANGUAGE_ID_NEUTRAL: LANGID = 0; // 0x0000, LANG_NEUTRAL
pub const LANGUAGE_ID_EN_US: LANGID = 1033; // 0x0409, en-US
// https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-ucoderef/28fefe92-d66c-4b03-90a9-97b473223d43
pub const CODE_PAGE_ID_EN_US: LANGID = 1200; // 0x04B0, UTF-16LE


// https://docs.microsoft.com/en-us/windows/win32/menurc/resource-types

pub const RT_CURSOR: WORD = 0x01;
pub const RT_BITMAP: WORD = 0x02;
pub const RT_ICON: WORD = 0x03;
pub const RT_MENU: WORD = 0x04;
pub const RT_DIALOG: WORD = 0x05;
pub const RT_STRING: WORD = 0x06;
pub const RT_FONTDIR: WORD = 0x07;
pub const RT_FONT: WORD = 0x08;
pub const RT_ACCELERATOR: WORD = 0x09;
pub const RT_RCDATA: WORD = 0x0A;
pub const RT_MESSAGETABLE: WORD = 0x0B;
pub const RT_GROUP_CURSOR: WORD = 0x0C;
pub const RT_GROUP_ICON: WORD = 0x0E;
pub const RT_VERSION: WORD = 0x10;
pub const RT_DLGINCLUDE: WORD = 0x11;
pub const RT_PLUGPLAY: WORD = 0x13;
pub const RT_VXD: WORD = 0x14;
pub const RT_ANICURSOR: WORD = 0x15;
pub const RT_ANIICON: WORD = 0x16;
pub const RT_HTML: WORD = 0x17;
pub const RT_MANIFEST: WORD = 0x18;

/// Symbolic names of the predefined resource types, used for display only.
pub const RT_NAMES: &[(WORD, &str)] = &[
    (RT_CURSOR, "CURSOR"),
    (RT_BITMAP, "BITMAP"),
    (RT_ICON, "ICON"),
    (RT_MENU, "MENU"),
    (RT_DIALOG, "DIALOG"),
    (RT_STRING, "STRING"),
    (RT_FONTDIR, "FONTDIR"),
    (RT_FONT, "FONT"),
    (RT_ACCELERATOR, "ACCELERATOR"),
    (RT_RCDATA, "RCDATA"),
    (RT_MESSAGETABLE, "MESSAGETABLE"),
    (RT_GROUP_CURSOR, "GROUP_CURSOR"),
    (RT_GROUP_ICON, "GROUP_ICON"),
    (RT_VERSION, "VERSION"),
    (RT_DLGINCLUDE, "DLGINCLUDE"),
    (RT_PLUGPLAY, "PLUGPLAY"),
    (RT_VXD, "VXD"),
    (RT_ANICURSOR, "ANICURSOR"),
    (RT_ANIICON, "ANIICON"),
    (RT_HTML, "HTML"),
    (RT_MANIFEST, "MANIFEST"),
];


// https://learn.microsoft.com/en-us/windows/win32/dlgbox/dialog-box-styles

pub const DS_SETFONT: DWORD = 0x00000040;
pub const DS_FIXEDSYS: DWORD = 0x00000008;
pub const DS_SHELLFONT: DWORD = DS_SETFONT | DS_FIXEDSYS;
pub const DS_MODALFRAME: DWORD = 0x00000080;
pub const WS_POPUP: DWORD = 0x80000000;
pub const WS_CHILD: DWORD = 0x40000000;
pub const WS_VISIBLE: DWORD = 0x10000000;
pub const WS_CAPTION: DWORD = 0x00C00000;
pub const WS_SYSMENU: DWORD = 0x00080000;
pub const WS_TABSTOP: DWORD = 0x00010000;

// https://learn.microsoft.com/en-us/windows/win32/api/winuser/ns-winuser-dlgtemplateex
pub const DIALOG_EX_SIGNATURE: WORD = 0xFFFF;
pub const DIALOG_EX_VERSION: WORD = 0x0001;

// predefined control class atoms
pub const CONTROL_BUTTON: WORD = 0x0080;
pub const CONTROL_EDIT: WORD = 0x0081;
pub const CONTROL_STATIC: WORD = 0x0082;
pub const CONTROL_LISTBOX: WORD = 0x0083;
pub const CONTROL_SCROLLBAR: WORD = 0x0084;
pub const CONTROL_COMBOBOX: WORD = 0x0085;


// https://learn.microsoft.com/en-us/windows/win32/menurc/normalmenuitem

pub const MF_GRAYED: WORD = 0x0001;
pub const MF_CHECKED: WORD = 0x0008;
pub const MF_POPUP: WORD = 0x0010;
pub const MF_END: WORD = 0x0080;

// https://learn.microsoft.com/en-us/windows/win32/menurc/menuex-template-item
pub const MFR_POPUP: WORD = 0x0001;
pub const MFR_END: WORD = 0x0080;
pub const MENU_EX_VERSION: WORD = 0x0001;


pub const VS_VERSION_INFO_KEY: &str = "VS_VERSION_INFO";
pub const VS_STRING_FILE_INFO_KEY: &str = "StringFileInfo";
pub const VS_VAR_FILE_INFO_KEY: &str = "VarFileInfo";
pub const VS_TRANSLATION_KEY: &str = "Translation";

pub const VS_COMMENTS: &str = "Comments";
pub const VS_COMPANY_NAME: &str = "CompanyName";
pub const VS_FILE_DESCRIPTION: &str = "FileDescription";
pub const VS_FILE_VERSION: &str = "FileVersion";
pub const VS_INTERNAL_NAME: &str = "InternalName";
pub const VS_LEGAL_COPYRIGHT: &str = "LegalCopyright";
pub const VS_LEGAL_TRADEMARKS: &str = "LegalTrademarks";
pub const VS_ORIGINAL_FILENAME: &str = "OriginalFilename";
pub const VS_PRIVATE_BUILD: &str = "PrivateBuild";
pub const VS_PRODUCT_NAME: &str = "ProductName";
pub const VS_PRODUCT_VERSION: &str = "ProductVersion";
pub const VS_SPECIAL_BUILD: &str = "SpecialBuild";


// https://docs.microsoft.com/en-us/windows/win32/api/verrsrc/ns-verrsrc-vs_fixedfileinfo

pub const VOS_NT_WINDOWS32: DWORD = 0x00040004;
pub const VFT_APP: DWORD = 0x00000001;
pub const VFT_DLL: DWORD = 0x00000002;
pub const VS_FFI_FILEFLAGSMASK: DWORD = 0x0000003F;

pub const VS_FIXEDFILEINFO_SIGNATURE: DWORD = 0xFEEF04BD;
pub const VS_FIXEDFILEINFO_VERSION: DWORD = 0x00010000;


// https://docs.microsoft.com/en-us/windows/win32/debug/pe-format

pub const PE_DOS_MAGIC: WORD = 0x5a4d; // MZ
pub const PE_PTR_OFFSET: DWORD = 0x03c;
pub const PE_NT_SIGNATURE: DWORD = 0x00004550; // PE00
pub const PE_32_MAGIC: WORD = 0x010b;
pub const PE_64_MAGIC: WORD = 0x020b;

// https://docs.microsoft.com/en-us/windows/win32/debug/pe-format#section-flags

pub const IMAGE_SCN_CNT_INITIALIZED_DATA: DWORD = 0x00000040;
pub const IMAGE_SCN_MEM_READ: DWORD = 0x40000000;

pub const IMAGE_RESOURCE_NAME_IS_STRING: DWORD = 0x80000000;
pub const IMAGE_RESOURCE_DATA_IS_DIRECTORY: DWORD = 0x80000000;
