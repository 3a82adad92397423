//! The static prompt table.
//!
//! One fixed extraction instruction per [`Category`]. The output keys named
//! here are the same names used by the PDF template's text fields, so merged
//! extraction results can be written into the form without a mapping layer.
//! The one exception is `cat`, a shorthand the merge step aliases into
//! `CategoryInDiscom`.

use crate::category::Category;

/// Look up the extraction instruction for a category.
pub fn prompt_for(category: Category) -> &'static str {
    match category {
        Category::Discom => DISCOM_PROMPT,
        Category::NetMeter => NET_METER_PROMPT,
        Category::Location => LOCATION_PROMPT,
        Category::PvModule => PV_MODULE_PROMPT,
        Category::Inverter => INVERTER_PROMPT,
    }
}

const DISCOM_PROMPT: &str = r#"For each of the following, extract the value from the field with the given label in the image and return as JSON:
- "Full Name of Premises Owner Person" → "Nameoftheapplicant"
- "Mobile" → "MobileNumber"
- "Email" → "Email"
- "Address of Premises for installation" → "AddressOfInstallation"
- "Pincode" → "PinCode"
- "State" → "State"
- "District" → "District"
- "Consumer Account Number (CA No.)" → "UscNumber"

Return as:
{
  "Nameoftheapplicant": "",
  "MobileNumber": "",
  "Email": "",
  "AddressOfInstallation": "",
  "PinCode": "",
  "State": "",
  "District": "",
  "UscNumber": ""
}
If a value is missing, return ""."#;

const NET_METER_PROMPT: &str = r#"For each of the following, extract the value from the field with the given label in the image and return as JSON:
- "Registration Number" → "NetMeterRegistrationNumber"
- "Registration Date" → "RegistrationDate"
- "Name" → "Nameoftheapplicant"
- "Service No" → "ServiceNumber"
- "Category" → "cat"
- "Category" → "CategoryInDiscom"
- "Existing Load" → "LoadinkW"
- "Proposed Solar Capacity" → "TotalPlantCapacity"

Return as:
{
  "NetMeterRegistrationNumber": "",
  "RegistrationDate": "",
  "Nameoftheapplicant": "",
  "ServiceNumber": "",
  "cat": "",
  "CategoryInDiscom": "",
  "LoadinkW": "",
  "TotalPlantCapacity": ""
}
If a value is missing, return ""."#;

const LOCATION_PROMPT: &str = r#"Extract the following fields from this image and return as JSON:
{
  "Latitude": "",
  "Longitude": ""
}
If a value is missing, return ""."#;

const PV_MODULE_PROMPT: &str = r#"Extract the following fields from this image and return as JSON:
{
  "PVMake": "",
  "PVSerialnumber": "",
  "Typeofmodule": "",
  "Capacityofeachmodule": "",
  "Numberofmodules": "",
  "Totalcapacity": ""
}
If a value is missing, return ""."#;

const INVERTER_PROMPT: &str = r#"For each of the following, extract the value from the field with the given label in the image and return as JSON:
- "Make" → "InverterMake"
- "Model" → "InverterModel"
- "Serial No." → "InverterSerialnumber"
- "Capacity" → "InverterCapacity"
- "Input Voltage" → "Inputvoltage"
- "Output Voltage" → "Outputvoltage"

Return as:
{
  "InverterMake": "",
  "InverterModel": "",
  "InverterSerialnumber": "",
  "InverterCapacity": "",
  "Inputvoltage": "",
  "Outputvoltage": ""
}
If a value is missing, return ""."#;
